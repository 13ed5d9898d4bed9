//! Jasper Portal
//!
//! Everything that talks to the control center: the per-project session
//! lifecycle, the browser login agent, the API client and the SIM lookup
//! built on top of them.

pub mod agent;
pub mod aggregator;
pub mod client;
pub mod playwright;
pub mod service;
pub mod session;

pub use agent::{LoginAgent, LoginOutcome, LoginRequest};
pub use aggregator::{SimDataAggregator, BASIC_LOOKUP_REQUEST, CHANGE_HISTORY_REQUEST};
pub use client::{ApiClient, PortalResponse};
pub use playwright::PlaywrightLoginAgent;
pub use service::SimDataService;
pub use session::{SessionManager, SessionState};
