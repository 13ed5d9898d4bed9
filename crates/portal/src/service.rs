//! SIM lookup service
//!
//! Ties a project's session to the aggregator and owns the retry policy:
//! a `cookies_need_update` result triggers one login and one more lookup.

use jasper_common::{ConfigStore, GetterConfig, Result, ResultEnvelope, SessionCookieSet};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::agent::LoginAgent;
use crate::aggregator::SimDataAggregator;
use crate::client::ApiClient;
use crate::playwright::PlaywrightLoginAgent;
use crate::session::SessionManager;

#[derive(Clone)]
pub struct SimDataService {
    store: Arc<ConfigStore>,
    client: ApiClient,
    agent: Arc<dyn LoginAgent>,
}

impl SimDataService {
    pub fn new(store: Arc<ConfigStore>, client: ApiClient, agent: Arc<dyn LoginAgent>) -> Self {
        Self {
            store,
            client,
            agent,
        }
    }

    /// Service backed by the Playwright login agent.
    pub fn from_config(config: &GetterConfig) -> Result<Self> {
        let store = Arc::new(ConfigStore::new(&config.config_dir));
        let client = ApiClient::new(store.clone(), &config.portal)?;
        let agent = Arc::new(PlaywrightLoginAgent::new(config.login.clone()));
        Ok(Self::new(store, client, agent))
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// Session for `project`, logging in if nothing is cached.
    pub async fn open_session(&self, project: &str) -> Result<SessionManager> {
        SessionManager::open(project, self.store.clone(), self.agent.clone()).await
    }

    /// Look up one SIM card for `project`.
    ///
    /// Login failures are returned as errors; query misses are envelopes.
    #[instrument(skip(self))]
    pub async fn fetch(&self, project: &str, search_value: &str) -> Result<ResultEnvelope> {
        let mut session = self.open_session(project).await?;
        let aggregator = SimDataAggregator::new(&self.client, search_value);

        let envelope = aggregator.get_sim_data(session.cookies()).await?;
        if !envelope.needs_cookie_update() {
            session.mark_valid();
            return Ok(envelope);
        }

        info!("Cookies for {} rejected, logging in again", project);
        session.mark_stale();
        let cookies = session.reauthenticate().await?;
        aggregator.get_sim_data(cookies).await
    }

    /// Force a fresh login for `project`, whatever the cached state.
    #[instrument(skip(self))]
    pub async fn refresh(&self, project: &str) -> Result<SessionCookieSet> {
        let mut session = SessionManager::load(project, self.store.clone(), self.agent.clone());
        session.mark_stale();
        Ok(session.reauthenticate().await?.clone())
    }
}
