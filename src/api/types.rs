//! Wire types for the notes backend.
//!
//! Field names follow the JSON the server produces (`doc_id`,
//! `current_stage`, `keyTerms`), so every struct derives `Serialize` and
//! `Deserialize` and round-trips unchanged.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Remote job status as reported by `GET /api/status/{doc_id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Ready,
    Generating,
    Completed,
    Failed,
    /// Any status string this client does not know. Never terminal.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Ready => write!(f, "ready"),
            JobStatus::Generating => write!(f, "generating"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Response of `POST /api/upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub doc_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub message: String,
}

/// Response of `GET /api/status/{doc_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub doc_id: String,
    pub status: JobStatus,
    /// Percentage in `0..=100`. Out-of-range or fractional values are clamped and rounded.
    #[serde(default, deserialize_with = "percent")]
    pub progress: u8,
    /// Human readable step, `null` while the server has nothing to say.
    #[serde(default)]
    pub current_stage: Option<String>,
}

/// Response of `POST /api/notes/generate/{doc_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub doc_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub message: String,
}

/// Response of `GET /api/notes/{doc_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotesResponse {
    pub doc_id: String,
    pub notes: Notes,
    /// Kept as the server sent it; the backend does not pin a timestamp format.
    pub generated_at: String,
}

/// A generated study guide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notes {
    pub title: String,
    pub summary: String,
    #[serde(rename = "keyTerms", default)]
    pub key_terms: Vec<KeyTerm>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyTerm {
    pub term: String,
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    #[serde(default)]
    pub introduction: String,
    #[serde(default)]
    pub subsections: Vec<Subsection>,
    #[serde(rename = "keyTerms", default, skip_serializing_if = "Vec::is_empty")]
    pub key_terms: Vec<KeyTerm>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subsection {
    pub subheading: String,
    #[serde(default)]
    pub points: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formulas: Vec<Formula>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    pub formula: String,
    pub explanation: String,
}

fn percent<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    if raw.is_nan() {
        return Ok(0);
    }
    Ok(raw.round().clamp(0.0, 100.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_response_deserialize_from_api_format() {
        let json = r#"{
            "doc_id": "doc-1",
            "status": "processing",
            "progress": 40,
            "current_stage": "Extracting text"
        }"#;
        let resp: StatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.doc_id, "doc-1");
        assert_eq!(resp.status, JobStatus::Processing);
        assert_eq!(resp.progress, 40);
        assert_eq!(resp.current_stage.as_deref(), Some("Extracting text"));
    }

    #[test]
    fn status_response_null_stage_and_fractional_progress() {
        let json = r#"{"doc_id": "d", "status": "ready", "progress": 99.6, "current_stage": null}"#;
        let resp: StatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, JobStatus::Ready);
        assert_eq!(resp.progress, 100);
        assert_eq!(resp.current_stage, None);
    }

    #[test]
    fn progress_is_clamped() {
        let json = r#"{"doc_id": "d", "status": "processing", "progress": 250}"#;
        let resp: StatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.progress, 100);

        let json = r#"{"doc_id": "d", "status": "processing", "progress": -5}"#;
        let resp: StatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.progress, 0);
    }

    #[test]
    fn unknown_status_is_tolerated() {
        let json = r#"{"doc_id": "d", "status": "queued", "progress": 0}"#;
        let resp: StatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, JobStatus::Unknown);
    }

    #[test]
    fn job_status_display() {
        assert_eq!(JobStatus::Processing.to_string(), "processing");
        assert_eq!(JobStatus::Completed.to_string(), "completed");
        assert_eq!(JobStatus::Unknown.to_string(), "unknown");
    }

    #[test]
    fn notes_response_deserialize_from_api_format() {
        let json = r#"{
            "doc_id": "doc-9",
            "notes": {
                "title": "Lecture 4: Photosynthesis",
                "summary": "How plants make energy.",
                "keyTerms": [{"term": "Chlorophyll", "definition": "Green pigment."}],
                "sections": [{
                    "heading": "Light reactions",
                    "introduction": "Happen in thylakoids.",
                    "subsections": [{
                        "subheading": "Photosystem II",
                        "points": ["Splits water"],
                        "formulas": [{"formula": "2H2O -> 4H+ + O2", "explanation": "Photolysis"}]
                    }]
                }]
            },
            "generated_at": "2024-05-01T10:00:00"
        }"#;
        let resp: NotesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.notes.title, "Lecture 4: Photosynthesis");
        assert_eq!(resp.notes.key_terms[0].term, "Chlorophyll");
        let sub = &resp.notes.sections[0].subsections[0];
        assert_eq!(sub.points, vec!["Splits water".to_string()]);
        assert!(sub.examples.is_empty());
        assert_eq!(sub.formulas[0].explanation, "Photolysis");
        assert!(resp.notes.sections[0].key_terms.is_empty());
    }

    #[test]
    fn key_terms_serialize_in_camel_case() {
        let notes = Notes {
            title: "t".into(),
            summary: "s".into(),
            key_terms: vec![KeyTerm {
                term: "a".into(),
                definition: "b".into(),
            }],
            sections: vec![],
        };
        let json = serde_json::to_string(&notes).unwrap();
        assert!(json.contains(r#""keyTerms""#));
        assert!(!json.contains("key_terms"));
    }
}
