//! Runtime configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration shared by the web server and the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GetterConfig {
    /// Directory holding accounts, templates and session documents
    pub config_dir: PathBuf,

    /// HTTP listen address
    pub listen: String,

    /// Optional log file (in addition to stderr)
    pub log_file: Option<PathBuf>,

    /// Interactive login configuration
    pub login: LoginConfig,

    /// Portal API configuration
    pub portal: PortalConfig,
}

impl Default for GetterConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("config"),
            listen: "0.0.0.0:5000".to_string(),
            log_file: None,
            login: LoginConfig::default(),
            portal: PortalConfig::default(),
        }
    }
}

/// Browser login configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    /// Node.js binary used to run the Playwright script
    pub node_binary: String,

    /// `NODE_PATH` for the script, so `require('playwright')` resolves
    pub node_path: Option<PathBuf>,

    /// Run the browser without a window
    pub headless: bool,

    /// Playwright browser type (chromium, firefox, webkit)
    pub browser: String,

    /// Wait for each login form element
    pub field_wait_secs: u64,

    /// Wait for each landing-page check
    pub landing_wait_secs: u64,

    /// Landing-page waits tolerated while a verification challenge is shown
    pub max_challenge_waits: u32,

    /// Title fragment of the page shown after a successful login
    pub success_title_marker: String,

    /// Title fragment of the login page itself
    pub login_title_marker: String,

    /// Title of the verification-code challenge page
    pub challenge_title: String,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            node_binary: "node".to_string(),
            node_path: None,
            headless: false,
            browser: "chromium".to_string(),
            field_wait_secs: 10,
            landing_wait_secs: 30,
            max_challenge_waits: 10,
            success_title_marker: "欢迎".to_string(),
            login_title_marker: "Welcome".to_string(),
            challenge_title: "身份验证".to_string(),
        }
    }
}

impl LoginConfig {
    pub fn field_wait(&self) -> Duration {
        Duration::from_secs(self.field_wait_secs)
    }

    pub fn landing_wait(&self) -> Duration {
        Duration::from_secs(self.landing_wait_secs)
    }

    /// Upper bound for a whole login attempt: silent reuse, three form
    /// fields, every landing wait, plus a minute for browser start-up.
    pub fn overall_deadline(&self) -> Duration {
        let landing = self.landing_wait() * (self.max_challenge_waits.max(1) + 1);
        self.field_wait() * 3 + landing + Duration::from_secs(60)
    }
}

/// Portal API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Per-request timeout
    pub request_timeout_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
        }
    }
}

impl PortalConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl GetterConfig {
    /// Load configuration from file, falling back to defaults if it is absent
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }
}
