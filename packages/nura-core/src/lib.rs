pub mod bridge;
pub mod config;
pub mod events;
pub mod format;
pub mod id;
pub mod logging;
pub mod reorder;
pub mod storage;
pub mod store;
pub mod tracker;
pub mod types;
