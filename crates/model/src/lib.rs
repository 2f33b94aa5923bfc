pub mod agency;
pub mod cache;
pub mod gtfs_static;
pub mod stop_event;
pub mod trip_update;
pub mod vehicle;
