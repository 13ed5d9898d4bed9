//! HTTP server
//!
//! One lookup endpoint plus a root page and a health check. Every response
//! of the lookup endpoint is wrapped as `{code, data, message, timeStamp}`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use dashmap::DashMap;
use jasper_common::{time, ResultEnvelope};
use jasper_portal::SimDataService;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const SUCCESS_MESSAGE: &str = "request succeeded";
const FAILURE_MESSAGE: &str = "backend error";

pub async fn serve(addr: SocketAddr, service: SimDataService) -> anyhow::Result<()> {
    let server = WebServer::new(service);
    server.serve(addr).await
}

/// Web server state
#[derive(Clone)]
pub struct WebServer {
    state: Arc<WebServerState>,
}

struct WebServerState {
    service: SimDataService,
    /// One lock per project so concurrent requests never log in twice
    project_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl WebServerState {
    fn project_lock(&self, project: &str) -> Arc<Mutex<()>> {
        self.project_locks
            .entry(project.to_string())
            .or_default()
            .clone()
    }
}

impl WebServer {
    pub fn new(service: SimDataService) -> Self {
        Self {
            state: Arc::new(WebServerState {
                service,
                project_locks: DashMap::new(),
            }),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/JasperGetter/SIMData", get(sim_data_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the web server
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        info!("SIM lookup endpoint listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}

// ============================================================================
// Response envelope
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: String,
    pub data: T,
    pub message: String,
    #[serde(rename = "timeStamp")]
    pub time_stamp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorData {
    pub error: String,
}

fn ok_response(envelope: ResultEnvelope) -> Response {
    let body = ApiEnvelope {
        code: "200".to_string(),
        data: envelope,
        message: SUCCESS_MESSAGE.to_string(),
        time_stamp: time::now_millis(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

fn error_response(error: impl Into<String>) -> Response {
    let body = ApiEnvelope {
        code: "500".to_string(),
        data: ErrorData {
            error: error.into(),
        },
        message: FAILURE_MESSAGE.to_string(),
        time_stamp: time::now_millis(),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

async fn root_handler() -> &'static str {
    "Nothing here. Query /JasperGetter/SIMData?project=<project>&search_value=<ICCID or VIN>"
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": jasper_common::VERSION
    }))
}

/// Lookup parameters; a repeated key keeps its first value.
#[derive(Debug, Default, PartialEq)]
struct SimDataQuery {
    project: String,
    search_value: String,
}

impl SimDataQuery {
    fn from_pairs(pairs: &[(String, String)]) -> Self {
        let first = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        };
        Self {
            project: first("project"),
            search_value: first("search_value"),
        }
    }
}

async fn sim_data_handler(
    State(state): State<Arc<WebServerState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let query = SimDataQuery::from_pairs(&pairs);
    let project = query.project.trim();
    if project.is_empty() {
        warn!("SIM lookup without a project");
        return error_response("missing or empty `project` parameter");
    }

    // Only configured projects get a lock entry
    if let Err(e) = state.service.store().credentials(project) {
        warn!("SIM lookup for unusable project {}: {}", project, e);
        return error_response(e.to_string());
    }

    let lock = state.project_lock(project);
    let _guard = lock.lock().await;

    match state.service.fetch(project, &query.search_value).await {
        Ok(envelope) => ok_response(envelope),
        Err(e) if e.is_login_failure() => {
            error!("Could not refresh portal cookies for {}: {}", project, e);
            error_response(format!("failed to refresh portal cookies for {project}: {e}"))
        }
        Err(e) => {
            error!("SIM lookup for {} failed: {}", project, e);
            error_response(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use jasper_common::store::{ACCOUNTS_FILE, PORTAL_LAYOUT_FILE, REQUEST_TEMPLATES_FILE};
    use jasper_common::{BrowserCookie, ConfigStore, PortalConfig, SessionCookieSet};
    use jasper_portal::{ApiClient, LoginAgent, LoginOutcome, LoginRequest};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tower::ServiceExt;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedAgent {
        outcome: LoginOutcome,
        calls: AtomicUsize,
    }

    impl FixedAgent {
        fn new(outcome: LoginOutcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
            })
        }

        fn fresh() -> Arc<Self> {
            Self::new(LoginOutcome::Authenticated {
                cookies: vec![BrowserCookie::new("JSESSIONID", "fresh")],
                reused_snapshot: false,
            })
        }
    }

    #[async_trait]
    impl LoginAgent for FixedAgent {
        async fn login(&self, _request: &LoginRequest) -> jasper_common::Result<LoginOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.outcome.clone())
        }
    }

    fn single_sim() -> Value {
        json!({
                "totalCount": 1,
                "data": [{
                    "simId": 1001,
                    "iccid": "89860000000000001001",
                    "simAuxFieldsDTO": {"imei": "861234567890123", "custom9": "T-BOX"},
                    "custom1": "LSVXBABDXR2023167",
                    "custom2": "GP",
                    "custom3": "ACTIVE",
                    "sessionType": "ONLINE",
                    "activationDate": 1704067200000_i64
                }]
        })
    }

    async fn portal() -> MockServer {
        portal_with(
            single_sim(),
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": []})),
        )
        .await
    }

    /// Portal accepting only `JSESSIONID=fresh`, answering lookups with `basic`.
    async fn portal_with(basic: Value, history: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sims"))
            .and(header("Cookie", "JSESSIONID=fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(basic))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/history"))
            .and(header("Cookie", "JSESSIONID=fresh"))
            .respond_with(history)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errorMessage": "Full authentication is required to access this resource"
            })))
            .with_priority(10)
            .mount(&server)
            .await;
        server
    }

    fn config_dir(portal: &MockServer) -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(ACCOUNTS_FILE),
            r#"{"GP": {"ID": "gp-operator", "PW": "secret"}}"#,
        )
        .unwrap();
        std::fs::write(
            tmp.path().join(PORTAL_LAYOUT_FILE),
            json!({
                "urls": {"Jasper_login": "https://cc.example.com/login", "Jasper_Homepage": "https://cc.example.com/home"},
                "element_xpath": {
                    "Input_box": {"login_username": "//input[1]", "login_password": "//input[2]"},
                    "button": {"login_submit": "//button"}
                }
            })
            .to_string(),
        )
        .unwrap();
        std::fs::write(
            tmp.path().join(REQUEST_TEMPLATES_FILE),
            json!({
                "sim_basic_data": {
                    "base_url": format!("{}/api/sims", portal.uri()),
                    "request_args": {"search": [{"value": "{search_value}"}]},
                    "headers": {"Cookie": "{cookies}"}
                },
                "sim_change_history": {
                    "base_url": format!("{}/api/history", portal.uri()),
                    "request_args": {"simId": "{search_value}"},
                    "headers": {"Cookie": "{cookies}"}
                }
            })
            .to_string(),
        )
        .unwrap();
        tmp
    }

    fn server(tmp: &TempDir, agent: Arc<FixedAgent>) -> WebServer {
        let store = Arc::new(ConfigStore::new(tmp.path()));
        let client = ApiClient::new(store.clone(), &PortalConfig::default()).unwrap();
        WebServer::new(SimDataService::new(store, client, agent))
    }

    fn router(tmp: &TempDir, agent: Arc<FixedAgent>) -> Router {
        server(tmp, agent).router()
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_lookup_logs_in_and_answers() {
        let server = portal().await;
        let tmp = config_dir(&server);
        let agent = FixedAgent::fresh();

        let (status, body) = get(
            router(&tmp, agent.clone()),
            "/JasperGetter/SIMData?project=GP&search_value=LSVXBABDXR2023167",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], "200");
        assert_eq!(body["data"]["success"], true);
        assert_eq!(body["data"]["sim_basic_data"]["sim_id"], "1001");
        assert_eq!(body["data"]["sim_basic_data"]["activation_datetime"], "2024-01-01 00:00:00");
        assert!(body["timeStamp"].as_i64().unwrap() > 1_700_000_000_000);
        assert_eq!(agent.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_project_is_500() {
        let server = portal().await;
        let tmp = config_dir(&server);
        let agent = FixedAgent::fresh();

        let (status, body) = get(router(&tmp, agent.clone()), "/JasperGetter/SIMData?search_value=8986").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "500");
        assert!(body["data"]["error"].as_str().unwrap().contains("project"));
        assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_cookie_refresh_is_500() {
        let server = portal().await;
        let tmp = config_dir(&server);
        let store = ConfigStore::new(tmp.path());
        let stale: SessionCookieSet = [("JSESSIONID".to_string(), "expired".to_string())]
            .into_iter()
            .collect();
        store.save_session_cookies("GP", &stale).unwrap();
        let agent = FixedAgent::new(LoginOutcome::ManualInterventionRequired);

        let (status, body) = get(router(&tmp, agent.clone()), "/JasperGetter/SIMData?project=GP&search_value=8986").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "500");
        assert!(body["data"]["error"].as_str().unwrap().contains("GP"));
        assert_eq!(agent.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_project_is_500() {
        let server = portal().await;
        let tmp = config_dir(&server);

        let (status, body) = get(router(&tmp, FixedAgent::fresh()), "/JasperGetter/SIMData?project=CEI&search_value=8986").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn test_repeated_keys_use_first_value() {
        let server = portal().await;
        let tmp = config_dir(&server);

        let (status, body) = get(
            router(&tmp, FixedAgent::fresh()),
            "/JasperGetter/SIMData?project=GP&project=CEI&search_value=LSVXBABDXR2023167&search_value=x",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["sim_basic_data"]["sim_id"], "1001");

        let (status, body) = get(
            router(&tmp, FixedAgent::fresh()),
            "/JasperGetter/SIMData?project=&project=&search_value=x",
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "500");
    }

    #[test]
    fn test_query_from_pairs() {
        let pairs = vec![
            ("search_value".to_string(), "8986".to_string()),
            ("project".to_string(), "GP".to_string()),
            ("project".to_string(), "CEI".to_string()),
        ];
        assert_eq!(
            SimDataQuery::from_pairs(&pairs),
            SimDataQuery {
                project: "GP".to_string(),
                search_value: "8986".to_string(),
            }
        );
        assert_eq!(SimDataQuery::from_pairs(&[]), SimDataQuery::default());
    }

    #[tokio::test]
    async fn test_unknown_projects_get_no_lock() {
        let portal = portal().await;
        let tmp = config_dir(&portal);
        let web = server(&tmp, FixedAgent::fresh());

        for i in 0..20 {
            let uri = format!("/JasperGetter/SIMData?project=junk{i}&search_value=8986");
            let (status, _) = get(web.router(), &uri).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        }
        assert_eq!(web.state.project_locks.len(), 0);

        let (status, _) = get(web.router(), "/JasperGetter/SIMData?project=GP&search_value=8986").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(web.state.project_locks.len(), 1);
    }

    #[tokio::test]
    async fn test_sim_not_found_is_200() {
        let server = portal_with(
            json!({"totalCount": 0, "data": []}),
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": []})),
        )
        .await;
        let tmp = config_dir(&server);

        let (status, body) = get(
            router(&tmp, FixedAgent::fresh()),
            "/JasperGetter/SIMData?project=GP&search_value=89860000000000009999",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], "200");
        assert_eq!(body["data"]["success"], false);
        assert_eq!(body["data"]["error_message"], "can_not_find_sim");
    }

    #[tokio::test]
    async fn test_history_failure_is_200_with_sim_data() {
        let server = portal_with(
            single_sim(),
            ResponseTemplate::new(200).set_body_json(json!({"success": false, "errorMessage": "busy"})),
        )
        .await;
        let tmp = config_dir(&server);

        let (status, body) = get(
            router(&tmp, FixedAgent::fresh()),
            "/JasperGetter/SIMData?project=GP&search_value=LSVXBABDXR2023167",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], "200");
        assert_eq!(body["data"]["success"], false);
        assert_eq!(body["data"]["sim_basic_data"]["iccid"], "89860000000000001001");
        assert_eq!(body["data"]["sim_change_history"], json!({}));
        assert!(body["data"].get("error_message").is_none());
    }

    #[tokio::test]
    async fn test_health() {
        let server = portal().await;
        let tmp = config_dir(&server);

        let (status, body) = get(router(&tmp, FixedAgent::fresh()), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
