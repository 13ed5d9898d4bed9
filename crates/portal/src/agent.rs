//! Interactive login agent interface

use async_trait::async_trait;
use jasper_common::{BrowserCookie, Credentials, PortalLayout, ProjectId, Result};

/// Everything an agent needs to sign one project in.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub project: ProjectId,
    pub credentials: Credentials,
    pub layout: PortalLayout,
    /// Browser cookies saved by the last successful login, tried first
    pub snapshot: Option<Vec<BrowserCookie>>,
}

/// How a login attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// The portal accepted us; these are the browser's cookies afterwards.
    Authenticated {
        cookies: Vec<BrowserCookie>,
        /// True when the saved snapshot was still accepted and no form was submitted
        reused_snapshot: bool,
    },
    /// A verification-code page stayed up for every allowed wait.
    ManualInterventionRequired,
    /// The login form or landing page never showed up as expected.
    Failed(String),
}

/// Performs the actual credential submission against the portal.
///
/// `Err` means the agent could not run at all (missing driver, crashed
/// process, deadline); a login the portal refused is `Ok(LoginOutcome::Failed)`.
#[async_trait]
pub trait LoginAgent: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<LoginOutcome>;
}
