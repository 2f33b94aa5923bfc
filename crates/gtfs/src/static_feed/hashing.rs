use sha2::{Digest, Sha256};

/// Content hash of a downloaded static-feed zip, used to decide whether an
/// agency's static tables need reloading. Matches exactly what the agency's
/// `current_hash` column stores: lowercase hex SHA-256 over the raw bytes.
pub fn hash_zip_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_for_the_same_bytes() {
        let a = hash_zip_bytes(b"hello gtfs");
        let b = hash_zip_bytes(b"hello gtfs");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn hash_differs_for_different_bytes() {
        assert_ne!(hash_zip_bytes(b"a"), hash_zip_bytes(b"b"));
    }
}
