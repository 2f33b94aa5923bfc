pub mod lookup;
pub mod meta;
pub mod static_feed;
pub mod stop_events;
