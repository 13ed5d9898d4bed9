//! Portal API client
//!
//! Builds requests from the named templates in the config store, replays the
//! session cookies, and classifies the response body.

use jasper_common::placeholder::{resolve_map, Params};
use jasper_common::{
    time, ConfigStore, PortalConfig, RequestTemplate, Result, SessionCookieSet,
    AUTH_REQUIRED_MESSAGE,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Query parameter carrying a nested template that the portal wants as JSON text.
const SEARCH_ARG: &str = "search";

/// Classified portal response body.
#[derive(Debug, Clone, PartialEq)]
pub enum PortalResponse {
    /// JSON body that is not an authentication error
    Data(Value),
    /// The portal rejected the session cookies
    AuthRequired,
    /// Body that is not JSON at all
    Unknown(String),
}

impl PortalResponse {
    pub fn classify(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(json) if is_auth_required(&json) => PortalResponse::AuthRequired,
            Ok(json) => PortalResponse::Data(json),
            Err(_) => PortalResponse::Unknown(body.to_string()),
        }
    }
}

/// Whether a decoded body carries the portal's authentication-required message.
pub fn is_auth_required(json: &Value) -> bool {
    json.get("errorMessage").and_then(Value::as_str) == Some(AUTH_REQUIRED_MESSAGE)
}

/// HTTP client for the portal API
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    store: Arc<ConfigStore>,
}

impl ApiClient {
    pub fn new(store: Arc<ConfigStore>, config: &PortalConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { http, store })
    }

    /// Send the named request with `search_value` and the given cookies.
    #[instrument(skip(self, cookies))]
    pub async fn invoke(
        &self,
        request_name: &str,
        search_value: &str,
        cookies: &SessionCookieSet,
    ) -> Result<PortalResponse> {
        let template = self.store.request_template(request_name)?;
        let params = request_params(search_value, cookies);
        let (url, headers) = build_request(&template, &params)?;
        debug!("GET {}", url);

        let mut request = self.http.get(&url);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("{} responded {} ({} bytes)", request_name, status, body.len());

        Ok(PortalResponse::classify(&body))
    }
}

/// Parameters every request template may reference.
pub fn request_params(search_value: &str, cookies: &SessionCookieSet) -> Params {
    let mut params = Params::new();
    params.insert("timestamp_now".into(), Value::from(time::now_millis()));
    params.insert("search_value".into(), Value::from(search_value));
    params.insert("cookies".into(), Value::from(cookies.header_value()));
    params
}

/// Resolve a template into a full URL and header list.
pub fn build_request(
    template: &RequestTemplate,
    params: &Params,
) -> Result<(String, Vec<(String, String)>)> {
    let mut args = resolve_map(&template.request_args, params)?;
    if let Some(search) = args.get_mut(SEARCH_ARG) {
        *search = Value::String(serde_json::to_string(search)?);
    }

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (name, value) in &args {
        query.append_pair(name, &scalar_text(value));
    }
    let query = query.finish();

    let url = if query.is_empty() {
        template.base_url.clone()
    } else {
        format!("{}?{}", template.base_url, query)
    };

    let headers = resolve_map(&template.headers, params)?
        .into_iter()
        .map(|(name, value)| (name, scalar_text(&value)))
        .collect();

    Ok((url, headers))
}

/// Text form of a JSON value for a query string or header.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
