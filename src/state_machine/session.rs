use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stage::{Event, InvalidTransition, Stage, StateMachine};
use crate::api::{ApiError, NotesResponse, StatusResponse};

/// Why a session ended up in [`Stage::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The server could not be reached when starting an operation.
    Network,
    /// The server rejected a request.
    Remote,
    /// The remote job itself reported `failed`.
    Job,
}

impl FailureKind {
    pub fn of(err: &ApiError) -> Self {
        if err.is_transient() {
            FailureKind::Network
        } else {
            FailureKind::Remote
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Network => write!(f, "network failure"),
            FailureKind::Remote => write!(f, "request rejected"),
            FailureKind::Job => write!(f, "job failed"),
        }
    }
}

/// Identifies the session an in-flight operation was started for.
///
/// A response is only applied if its token still matches the session:
/// a reset or new upload mints a new `session_id`, so anything started
/// before it turns into a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub session_id: Uuid,
    pub document_id: Option<String>,
}

/// The state of one document workflow.
///
/// Owned by the orchestrator; everyone else sees clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub stage: Stage,
    pub document_id: Option<String>,
    pub filename: Option<String>,
    /// Percentage reported by the last applied poll.
    pub progress: u8,
    /// Last step description the server gave. Kept until replaced.
    pub status_text: Option<String>,
    /// Present only in [`Stage::Viewing`].
    pub result: Option<NotesResponse>,
    /// Present only in [`Stage::Failed`].
    pub last_error: Option<String>,
    pub failure: Option<FailureKind>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            stage: Stage::Idle,
            document_id: None,
            filename: None,
            progress: 0,
            status_text: None,
            result: None,
            last_error: None,
            failure: None,
            updated_at: Utc::now(),
        }
    }

    pub fn token(&self) -> SessionToken {
        SessionToken {
            session_id: self.session_id,
            document_id: self.document_id.clone(),
        }
    }

    pub fn is_current(&self, token: &SessionToken) -> bool {
        self.session_id == token.session_id && self.document_id == token.document_id
    }

    pub(crate) fn apply(&mut self, event: Event) -> Result<Stage, InvalidTransition> {
        self.stage = StateMachine::next(self.stage, event)?;
        self.updated_at = Utc::now();
        Ok(self.stage)
    }

    pub(crate) fn record_status(&mut self, status: &StatusResponse) {
        self.progress = status.progress;
        if let Some(text) = &status.current_stage {
            self.status_text = Some(text.clone());
        }
        self.updated_at = Utc::now();
    }

    pub(crate) fn fail(
        &mut self,
        event: Event,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Result<(), InvalidTransition> {
        self.apply(event)?;
        self.result = None;
        self.last_error = Some(message.into());
        self.failure = Some(kind);
        Ok(())
    }
}
