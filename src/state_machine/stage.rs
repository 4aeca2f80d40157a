use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a document session is in the two-phase workflow.
///
/// A session flows: IDLE → UPLOADING → PROCESSING → READY →
/// GENERATION_STARTING → GENERATING → VIEWING, with FAILED reachable from
/// every step that talks to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Idle,
    Uploading,
    Processing,
    Ready,
    GenerationStarting,
    Generating,
    Viewing,
    Failed,
}

impl Stage {
    /// Stages that wait for the user before anything else happens.
    pub fn is_settled(self) -> bool {
        matches!(self, Stage::Idle | Stage::Ready | Stage::Viewing | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Idle => write!(f, "IDLE"),
            Stage::Uploading => write!(f, "UPLOADING"),
            Stage::Processing => write!(f, "PROCESSING"),
            Stage::Ready => write!(f, "READY"),
            Stage::GenerationStarting => write!(f, "GENERATION_STARTING"),
            Stage::Generating => write!(f, "GENERATING"),
            Stage::Viewing => write!(f, "VIEWING"),
            Stage::Failed => write!(f, "FAILED"),
        }
    }
}

/// Everything that can move a session from one stage to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    DocumentSelected,
    UploadSucceeded,
    UploadFailed,
    ProcessingReady,
    ProcessingFailed,
    GenerateRequested,
    GenerationStarted,
    GenerationStartFailed,
    GenerationCompleted,
    GenerationFailed,
    Retry,
    Reset,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Event::DocumentSelected => "submit",
            Event::UploadSucceeded => "upload succeeded",
            Event::UploadFailed => "upload failed",
            Event::ProcessingReady => "processing ready",
            Event::ProcessingFailed => "processing failed",
            Event::GenerateRequested => "generate",
            Event::GenerationStarted => "generation started",
            Event::GenerationStartFailed => "generation start failed",
            Event::GenerationCompleted => "generation completed",
            Event::GenerationFailed => "generation failed",
            Event::Retry => "retry",
            Event::Reset => "reset",
        };
        f.write_str(name)
    }
}

/// An event that is not allowed in the current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {event} while {stage}")]
pub struct InvalidTransition {
    pub stage: Stage,
    pub event: Event,
}

/// The lifecycle transition table. Pure: side effects belong to the orchestrator.
pub struct StateMachine;

impl StateMachine {
    /// Compute the stage that `event` leads to from `stage`.
    ///
    /// `Reset` is accepted everywhere. Every other event is only valid in the
    /// single stage that expects it.
    pub fn next(stage: Stage, event: Event) -> Result<Stage, InvalidTransition> {
        use Event::*;
        use Stage::*;

        let next = match (stage, event) {
            (_, Reset) => Idle,
            (Idle, DocumentSelected) => Uploading,
            (Uploading, UploadSucceeded) => Processing,
            (Uploading, UploadFailed) => Failed,
            (Processing, ProcessingReady) => Ready,
            (Processing, ProcessingFailed) => Failed,
            (Ready, GenerateRequested) => GenerationStarting,
            (GenerationStarting, GenerationStarted) => Generating,
            (GenerationStarting, GenerationStartFailed) => Failed,
            (Generating, GenerationCompleted) => Viewing,
            (Generating, GenerationFailed) => Failed,
            (Failed, Retry) => Idle,
            _ => return Err(InvalidTransition { stage, event }),
        };
        Ok(next)
    }
}
