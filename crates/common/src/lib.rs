//! Jasper Getter Common Library
//!
//! Shared types, configuration documents and utilities for looking up SIM
//! cards on a Jasper-style control center.

pub mod config;
pub mod error;
pub mod placeholder;
pub mod store;
pub mod time;
pub mod types;

// Re-export commonly used types
pub use config::{GetterConfig, LoginConfig, PortalConfig};
pub use error::{Error, Result};
pub use placeholder::{resolve_placeholders, Params};
pub use store::ConfigStore;
pub use types::*;

/// Jasper Getter version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
