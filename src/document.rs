//! The document a user submits, and the checks it must pass before upload.

use std::path::Path;

use thiserror::Error;

/// A document rejected before any remote call was made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unsupported document type {found:?} (expected one of: {expected})")]
    UnsupportedType { found: String, expected: String },

    #[error("document {0:?} is empty")]
    Empty(String),

    #[error("document is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
}

/// Which documents the backend accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRules {
    /// Lowercase extensions without the dot.
    pub accepted_extensions: Vec<String>,
    pub max_bytes: u64,
}

impl Default for DocumentRules {
    fn default() -> Self {
        Self {
            accepted_extensions: vec!["pdf".to_string()],
            max_bytes: 50 * 1024 * 1024,
        }
    }
}

/// An in-memory document ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    filename: String,
    bytes: Vec<u8>,
}

impl Document {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a document from disk. The upload keeps only the file name, not the path.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        Ok(Self::new(filename, bytes))
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercased extension, if the file name has one.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    pub fn mime_type(&self) -> &'static str {
        match self.extension().as_deref() {
            Some("pdf") => "application/pdf",
            Some("pptx") => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            _ => "application/octet-stream",
        }
    }

    pub fn validate(&self, rules: &DocumentRules) -> Result<(), ValidationError> {
        let extension = self.extension().unwrap_or_default();
        if !rules
            .accepted_extensions
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(&extension))
        {
            return Err(ValidationError::UnsupportedType {
                found: self.filename.clone(),
                expected: rules.accepted_extensions.join(", "),
            });
        }
        if self.is_empty() {
            return Err(ValidationError::Empty(self.filename.clone()));
        }
        if self.len() > rules.max_bytes {
            return Err(ValidationError::TooLarge {
                size: self.len(),
                limit: rules.max_bytes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_pdf_regardless_of_case() {
        let doc = Document::new("Lecture 4.PDF", b"%PDF-1.7".to_vec());
        assert_eq!(doc.validate(&DocumentRules::default()), Ok(()));
        assert_eq!(doc.mime_type(), "application/pdf");
    }

    #[test]
    fn rejects_unsupported_extension() {
        let doc = Document::new("notes.docx", b"data".to_vec());
        let err = doc.validate(&DocumentRules::default()).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedType { .. }));

        let doc = Document::new("no_extension", b"data".to_vec());
        assert!(doc.validate(&DocumentRules::default()).is_err());
    }

    #[test]
    fn rejects_empty_document() {
        let doc = Document::new("empty.pdf", Vec::new());
        assert_eq!(
            doc.validate(&DocumentRules::default()),
            Err(ValidationError::Empty("empty.pdf".into()))
        );
    }

    #[test]
    fn rejects_oversized_document() {
        let rules = DocumentRules {
            max_bytes: 4,
            ..Default::default()
        };
        let doc = Document::new("big.pdf", b"%PDF-1.7".to_vec());
        assert_eq!(
            doc.validate(&rules),
            Err(ValidationError::TooLarge { size: 8, limit: 4 })
        );
    }

    #[test]
    fn extra_extensions_can_be_enabled() {
        let rules = DocumentRules {
            accepted_extensions: vec!["pdf".into(), "pptx".into()],
            ..Default::default()
        };
        let doc = Document::new("slides.pptx", b"PK".to_vec());
        assert_eq!(doc.validate(&rules), Ok(()));
        assert!(doc.mime_type().contains("presentationml"));
    }

    #[tokio::test]
    async fn from_path_keeps_file_name_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("week1.pdf");
        std::fs::write(&path, b"%PDF-1.4 body").unwrap();

        let doc = Document::from_path(&path).await.unwrap();
        assert_eq!(doc.filename(), "week1.pdf");
        assert_eq!(doc.len(), 13);
    }
}
