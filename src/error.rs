use thiserror::Error;

use crate::api::ApiError;
use crate::document::ValidationError;
use crate::state_machine::InvalidTransition;

/// Why an orchestrator action was refused.
///
/// Remote failures are not reported here: they move the session to
/// `Failed` and are read back from the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("invalid document: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

#[derive(Debug, Error)]
pub enum NotesError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
