//! CLI Commands

pub mod query;
pub mod session;
