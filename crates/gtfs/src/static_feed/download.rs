use std::fs;
use std::path::{Path, PathBuf};

use crate::error::GtfsError;

const REQUIRED_FEED_FILES: &[&str] =
    &["routes.txt", "stops.txt", "trips.txt", "stop_times.txt"];

/// Downloads `url` into `dest_dir` as `<name>.zip`, writing to a `.part`
/// sibling first and renaming atomically on success so a crash mid-download
/// never leaves a half-written archive in place of the previous good one.
pub async fn download_zip(
    url: &str,
    dest_dir: &Path,
    name: &str,
) -> Result<PathBuf, GtfsError> {
    fs::create_dir_all(dest_dir)?;
    let final_path = dest_dir.join(format!("{name}.zip"));
    let part_path = dest_dir.join(format!("{name}.zip.part"));

    let response = reqwest::get(url).await?.error_for_status()?;
    let bytes = response.bytes().await?;

    let write_result = fs::write(&part_path, &bytes);
    if let Err(why) = write_result {
        let _ = fs::remove_file(&part_path);
        return Err(why.into());
    }

    fs::rename(&part_path, &final_path)?;
    Ok(final_path)
}

/// Extracts a zip archive into `out_dir`, then locates the directory that
/// actually contains the required feed files - some publishers nest the feed
/// one level deep inside the archive rather than at its root.
pub fn extract_zip(zip_path: &Path, out_dir: &Path) -> Result<PathBuf, GtfsError> {
    if out_dir.exists() {
        fs::remove_dir_all(out_dir)?;
    }
    fs::create_dir_all(out_dir)?;

    let file = fs::File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative_path) = entry.enclosed_name() else {
            continue;
        };
        let out_path = out_dir.join(relative_path);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out_file = fs::File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out_file)?;
    }

    find_feed_root(out_dir)
}

fn find_feed_root(search_root: &Path) -> Result<PathBuf, GtfsError> {
    let mut candidates = vec![search_root.to_path_buf()];
    for entry in fs::read_dir(search_root)?.flatten() {
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            candidates.push(entry.path());
        }
    }

    for candidate in candidates {
        if REQUIRED_FEED_FILES
            .iter()
            .all(|file| candidate.join(file).is_file())
        {
            return Ok(candidate);
        }
    }

    Err(GtfsError::MissingFile(
        "routes.txt/stops.txt/trips.txt/stop_times.txt (not found at archive root or one level down)",
    ))
}
