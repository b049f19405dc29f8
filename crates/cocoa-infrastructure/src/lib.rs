//! Adapters for the Cocoa client: HTTP transport, platform paths and config storage.

pub mod http_backend;
pub mod paths;
pub mod storage;

pub use crate::http_backend::HttpSearchBackend;
pub use crate::paths::CocoaPaths;
pub use crate::storage::ConfigStorage;
