pub mod protobuf {
    #![allow(clippy::all)]
    include!(concat!(env!("OUT_DIR"), "/protobuf/transit_realtime.rs"));
}

pub mod error;
pub mod realtime;
pub mod static_feed;

pub use error::GtfsError;
pub use static_feed::hashing;
