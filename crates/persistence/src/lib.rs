#![forbid(unsafe_code)]

pub mod bridge;
pub mod http;

pub use bridge::{InMemoryBridge, PersistError, PersistenceBridge, PostedAnswer};
pub use http::{HttpBridge, HttpBridgeConfig, TokenSource};
