//! Jasper Getter Web
//!
//! Serves `GET /JasperGetter/SIMData` on top of the portal lookup service.

pub mod server;

pub use server::{serve, WebServer};
