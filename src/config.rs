//! Configuration loaded from `notesai.toml`.
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! `NOTESAI_API_BASE` takes precedence over the file; CLI flags are applied
//! on top by the binary.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::api::{DEFAULT_API_BASE, HttpTimeouts};
use crate::document::DocumentRules;
use crate::error::NotesError;
use crate::orchestrator::OrchestratorSettings;

pub const CONFIG_FILE: &str = "notesai.toml";
pub const API_BASE_ENV: &str = "NOTESAI_API_BASE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotesConfig {
    /// Base URL of the notes backend.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Delay between status checks, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Upper bound for a single request, upload included.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Lowercase file extensions accepted for upload.
    #[serde(default = "default_accepted_extensions")]
    pub accepted_extensions: Vec<String>,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    120
}

// 50 MiB, the backend's own limit.
fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_accepted_extensions() -> Vec<String> {
    vec!["pdf".to_string()]
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            poll_interval_ms: default_poll_interval_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_upload_bytes: default_max_upload_bytes(),
            accepted_extensions: default_accepted_extensions(),
        }
    }
}

impl NotesConfig {
    /// Load `notesai.toml` from the working directory, then apply the environment.
    pub fn load() -> Result<Self, NotesError> {
        let mut config = Self::load_from(Path::new(CONFIG_FILE))?;
        config.apply_env(std::env::var(API_BASE_ENV).ok());
        Ok(config)
    }

    /// Read `path` if it exists, defaults otherwise. No environment lookup.
    pub fn load_from(path: &Path) -> Result<Self, NotesError> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<NotesConfig>(&contents)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, api_base: Option<String>) {
        if let Some(base) = api_base.filter(|base| !base.trim().is_empty()) {
            self.api_base = base;
        }
    }

    pub fn validate(&self) -> Result<(), NotesError> {
        if self.api_base.trim().is_empty() {
            return Err(NotesError::Config("api_base must not be empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(NotesError::Config("poll_interval_ms must be positive".into()));
        }
        if self.accepted_extensions.is_empty() {
            return Err(NotesError::Config(
                "accepted_extensions must list at least one extension".into(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeouts(&self) -> HttpTimeouts {
        HttpTimeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            request: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn rules(&self) -> DocumentRules {
        DocumentRules {
            accepted_extensions: self
                .accepted_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            max_bytes: self.max_upload_bytes,
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            poll_interval: self.poll_interval(),
            rules: self.rules(),
        }
    }
}
