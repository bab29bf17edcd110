use thiserror::Error;

#[derive(Error, Debug)]
pub enum PinupError {
    #[error("Project validation failed: {0}")]
    ProjectValidation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Resolution failed: {0}")]
    Resolution(String),

    #[error("External tool failed: {0}")]
    ExternalTool(String),

    #[error("Git operation failed: {0}")]
    GitOperation(String),

    #[error("Remote API request failed: {0}")]
    RemoteApi(String),

    #[error("Applying updates failed: {0}")]
    Apply(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl PinupError {
    /// The message without the variant's category prefix.
    pub fn detail(&self) -> String {
        match self {
            PinupError::ProjectValidation(msg)
            | PinupError::Config(msg)
            | PinupError::Resolution(msg)
            | PinupError::ExternalTool(msg)
            | PinupError::GitOperation(msg)
            | PinupError::RemoteApi(msg)
            | PinupError::Apply(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PinupError>;
