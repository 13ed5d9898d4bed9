//! Error types for Jasper Getter

use thiserror::Error;

/// Result type alias using Jasper Getter Error
pub type Result<T> = std::result::Result<T, Error>;

/// Jasper Getter error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store lock error: {0}")]
    StoreLock(String),

    #[error("Template placeholder has no parameter: {name}")]
    MissingPlaceholder { name: String },

    #[error("Request template not found: {0}")]
    TemplateNotFound(String),

    #[error("Project not configured: {0}")]
    UnknownProject(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Login agent failed: {0}")]
    AgentLoginFailure(String),

    #[error("Verification challenge for project {project} needs an operator")]
    ManualInterventionRequired { project: String },

    #[error("Login agent error: {0}")]
    Agent(String),

    #[error("Operation timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error means the portal session could not be refreshed.
    pub fn is_login_failure(&self) -> bool {
        matches!(
            self,
            Error::AgentLoginFailure(_)
                | Error::ManualInterventionRequired { .. }
                | Error::Agent(_)
                | Error::Timeout { .. }
        )
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(e: tempfile::PersistError) -> Self {
        Error::Io(e.error)
    }
}
