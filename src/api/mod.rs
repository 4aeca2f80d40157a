pub mod client;
pub mod error;
pub mod types;

pub use client::{DEFAULT_API_BASE, HttpJobApi, HttpTimeouts, JobApi};
pub use error::ApiError;
pub use types::{
    Formula, GenerateResponse, JobStatus, KeyTerm, Notes, NotesResponse, Section, StatusResponse,
    Subsection, UploadResponse,
};
