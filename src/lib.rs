//! notesai: drives a lecture document through upload, server-side
//! processing, note generation and retrieval against the notes backend.
//!
//! The [`Orchestrator`] owns the [`Session`] and is the only thing that
//! changes it; the [`Poller`] watches the remote jobs; [`HttpJobApi`] talks
//! to the backend.

pub mod api;
pub mod config;
pub mod document;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod poller;
pub mod state_machine;

pub use api::{ApiError, HttpJobApi, JobApi, JobStatus, NotesResponse};
pub use config::NotesConfig;
pub use document::{Document, DocumentRules, ValidationError};
pub use error::{ActionError, NotesError};
pub use orchestrator::{Orchestrator, OrchestratorSettings, Phase};
pub use poller::{PollTarget, Poller};
pub use state_machine::{Event, FailureKind, Session, Stage, StateMachine};
