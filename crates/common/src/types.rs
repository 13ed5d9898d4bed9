//! Core types for Jasper Getter

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Tenant/account key on the control center ("GP", "CEI", ...)
pub type ProjectId = String;

/// Phrase the portal puts in `errorMessage` when the session cookies are rejected.
pub const AUTH_REQUIRED_MESSAGE: &str = "Full authentication is required to access this resource";

// ============================================================================
// Session state
// ============================================================================

/// Name/value cookie mapping replayed into portal API calls.
///
/// Rebuilt from scratch on every re-authentication; never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCookieSet(BTreeMap<String, String>);

impl SessionCookieSet {
    pub fn new(cookies: BTreeMap<String, String>) -> Self {
        Self(cookies)
    }

    /// Reduce browser cookie records to their name/value pairs.
    pub fn from_browser_cookies(cookies: &[BrowserCookie]) -> Self {
        Self(
            cookies
                .iter()
                .map(|c| (c.name.clone(), c.value.clone()))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Cookie` header value: `name=value` pairs joined by `;`.
    pub fn header_value(&self) -> String {
        self.0
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl FromIterator<(String, String)> for SessionCookieSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Cookie record as captured from a browser session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Expiry in epoch seconds; Playwright calls this `expires`.
    #[serde(default, alias = "expires", skip_serializing_if = "Option::is_none")]
    pub expiry: Option<f64>,
    #[serde(default, rename = "httpOnly", skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(default, rename = "sameSite", skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
    /// Browser attributes not modelled above
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl BrowserCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            expiry: None,
            http_only: None,
            secure: None,
            same_site: None,
            extra: serde_json::Map::new(),
        }
    }
}

// ============================================================================
// Configuration documents
// ============================================================================

/// Control center account for one project.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "PW")]
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &self.id)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Login page URLs and XPath locators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalLayout {
    pub urls: PortalUrls,
    pub element_xpath: ElementLocators,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalUrls {
    #[serde(rename = "Jasper_login")]
    pub login: String,
    #[serde(rename = "Jasper_Homepage")]
    pub home: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementLocators {
    #[serde(rename = "Input_box")]
    pub input_box: InputBoxLocators,
    pub button: ButtonLocators,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputBoxLocators {
    pub login_username: String,
    pub login_password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_sim: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonLocators {
    pub login_submit: String,
}

/// Parameterized portal API request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTemplate {
    pub base_url: String,
    /// Query parameters; `search` holds a nested template sent as a JSON string
    #[serde(default)]
    pub request_args: serde_json::Map<String, Value>,
    #[serde(default)]
    pub headers: serde_json::Map<String, Value>,
}

// ============================================================================
// Lookup results
// ============================================================================

/// Identity and status of one SIM card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimRecord {
    pub sim_id: String,
    pub iccid: Option<String>,
    pub imei: Option<String>,
    pub bound_vin: Option<String>,
    pub brand: Option<String>,
    pub lifecycle: Option<String>,
    pub session_type_now: Option<String>,
    pub device_type: Option<String>,
    /// `YYYY-MM-DD HH:MM:SS`, UTC
    pub activation_datetime: Option<String>,
}

/// One state transition of a SIM card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeHistoryEntry {
    pub target_value: Value,
    pub source_value: Value,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub change_by: Option<String>,
}

/// Change history keyed by change type, in the order the portal listed them.
pub type ChangeHistory = IndexMap<String, ChangeHistoryEntry>;

/// Caller-facing failure reasons carried in the result envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMessage {
    CookiesNeedUpdate,
    CanNotFindSim,
    MoreThanOneSim,
    UnknownError,
}

impl ErrorMessage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorMessage::CookiesNeedUpdate => "cookies_need_update",
            ErrorMessage::CanNotFindSim => "can_not_find_sim",
            ErrorMessage::MoreThanOneSim => "more_than_one_sim",
            ErrorMessage::UnknownError => "unknown_error",
        }
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a SIM lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<ErrorMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sim_basic_data: Option<SimRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sim_change_history: Option<ChangeHistory>,
}

impl ResultEnvelope {
    pub fn failure(reason: ErrorMessage) -> Self {
        Self {
            success: false,
            error_message: Some(reason),
            sim_basic_data: None,
            sim_change_history: None,
        }
    }

    pub fn needs_cookie_update(&self) -> bool {
        self.error_message == Some(ErrorMessage::CookiesNeedUpdate)
    }
}
