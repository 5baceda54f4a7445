//! On-disk state protocol: the record store and its file watcher.

pub mod store;
pub mod watcher;

pub use store::StateStore;
pub use watcher::{StateWatcher, WatchStreams, ERROR_BUFFER, EVENT_BUFFER};
