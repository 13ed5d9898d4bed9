//! Portal session lifecycle for one project
//!
//! ```text
//!   NoSession ──┐                   ┌──> Valid
//!               ├──> Reauthenticating
//!   Stale ──────┘                   └──> (failure: back to NoSession / Stale)
//!     ^
//!   Loaded ──(portal rejects cookies)
//!     └─────(portal accepts cookies)──> Valid
//! ```

use jasper_common::{ConfigStore, Error, ProjectId, Result, SessionCookieSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::agent::{LoginAgent, LoginOutcome, LoginRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing cached for the project
    NoSession,
    /// Cached cookies, not yet tried against the portal
    Loaded,
    /// The portal accepted the current cookies
    Valid,
    /// The portal rejected the current cookies
    Stale,
    /// A login is in progress
    Reauthenticating,
}

/// Owns the session cookies of one project and is the only writer of its
/// persisted session state.
pub struct SessionManager {
    project: ProjectId,
    store: Arc<ConfigStore>,
    agent: Arc<dyn LoginAgent>,
    state: SessionState,
    cookies: SessionCookieSet,
}

impl SessionManager {
    /// Load the cached session, logging in right away if there is none.
    #[instrument(skip(store, agent))]
    pub async fn open(
        project: &str,
        store: Arc<ConfigStore>,
        agent: Arc<dyn LoginAgent>,
    ) -> Result<Self> {
        let mut manager = Self::load(project, store, agent);
        if manager.state == SessionState::NoSession {
            manager.reauthenticate().await?;
        }
        Ok(manager)
    }

    /// Load the cached session without ever starting a login.
    pub fn load(project: &str, store: Arc<ConfigStore>, agent: Arc<dyn LoginAgent>) -> Self {
        let (state, cookies) = match store.load_session_cookies(project) {
            Ok(Some(cookies)) if !cookies.is_empty() => {
                debug!(
                    "Cached cookies for {}: {}",
                    project,
                    cookies.names().collect::<Vec<_>>().join(", ")
                );
                (SessionState::Loaded, cookies)
            }
            Ok(_) => {
                info!("No cached session for {}", project);
                (SessionState::NoSession, SessionCookieSet::default())
            }
            Err(e) => {
                warn!("Session store unreadable, treating {} as logged out: {}", project, e);
                (SessionState::NoSession, SessionCookieSet::default())
            }
        };

        Self {
            project: project.to_string(),
            store,
            agent,
            state,
            cookies,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Cookies to replay into portal calls; empty when logged out.
    pub fn cookies(&self) -> &SessionCookieSet {
        &self.cookies
    }

    /// The portal accepted the current cookies.
    pub fn mark_valid(&mut self) {
        if matches!(self.state, SessionState::Loaded | SessionState::Valid) {
            self.state = SessionState::Valid;
        }
    }

    /// The portal rejected the current cookies.
    pub fn mark_stale(&mut self) {
        if self.state != SessionState::NoSession {
            info!("Session for {} is stale", self.project);
            self.state = SessionState::Stale;
        }
    }

    /// Log in through the agent and persist the new session.
    ///
    /// On failure nothing is persisted and the previous cookies stay in place.
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn reauthenticate(&mut self) -> Result<&SessionCookieSet> {
        let previous = self.state;
        self.state = SessionState::Reauthenticating;

        match self.login().await {
            Ok(cookies) => {
                self.cookies = cookies;
                self.state = SessionState::Valid;
                info!("Session for {} refreshed", self.project);
                Ok(&self.cookies)
            }
            Err(e) => {
                self.state = match previous {
                    SessionState::NoSession => SessionState::NoSession,
                    _ => SessionState::Stale,
                };
                warn!("Session refresh for {} failed: {}", self.project, e);
                Err(e)
            }
        }
    }

    async fn login(&self) -> Result<SessionCookieSet> {
        let credentials = self.store.credentials(&self.project)?;
        let layout = self.store.portal_layout()?;
        let snapshot = self
            .store
            .load_browser_snapshot(&self.project)
            .unwrap_or_else(|e| {
                warn!("Ignoring unreadable browser snapshot store: {}", e);
                None
            });

        let request = LoginRequest {
            project: self.project.clone(),
            credentials,
            layout,
            snapshot,
        };

        match self.agent.login(&request).await? {
            LoginOutcome::Authenticated { cookies, .. } => {
                let session = SessionCookieSet::from_browser_cookies(&cookies);
                if session.is_empty() {
                    return Err(Error::AgentLoginFailure(
                        "login agent returned no cookies".to_string(),
                    ));
                }
                let store = self.store.clone();
                let project = self.project.clone();
                let stored = session.clone();
                tokio::task::spawn_blocking(move || {
                    store.save_browser_snapshot(&project, &cookies)?;
                    store.save_session_cookies(&project, &stored)
                })
                .await
                .map_err(|e| Error::Internal(format!("session store task failed: {e}")))??;
                Ok(session)
            }
            LoginOutcome::ManualInterventionRequired => Err(Error::ManualInterventionRequired {
                project: self.project.clone(),
            }),
            LoginOutcome::Failed(reason) => Err(Error::AgentLoginFailure(reason)),
        }
    }
}
