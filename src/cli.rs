//! Command line of the `notesai` binary, built on clap.
//!
//! [`Cli`] carries the subcommands ([`Command`]: run, status, notes) and the
//! global flags that override `notesai.toml`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use notesai::NotesConfig;

/// notesai: turn lecture slides into structured study notes.
#[derive(Debug, Parser)]
#[command(name = "notesai", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Base URL of the notes backend.
    #[arg(long, global = true)]
    pub api_base: Option<String>,

    /// Milliseconds between status checks.
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_ms: Option<u64>,

    /// Log debug output to stderr.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload a document, wait for processing, generate notes and print them.
    Run {
        /// Path to the document (PDF).
        file: PathBuf,

        /// Print the notes as JSON instead of Markdown.
        #[arg(long)]
        json: bool,

        /// Stop once the document is ready, without generating notes.
        #[arg(long)]
        no_generate: bool,
    },

    /// Read the status of an uploaded document once.
    Status {
        doc_id: String,
    },

    /// Print the notes generated for a document.
    Notes {
        doc_id: String,

        /// Print JSON instead of Markdown.
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Apply the global flags on top of the loaded configuration.
    pub fn apply_to(&self, config: &mut NotesConfig) {
        if let Some(base) = &self.api_base {
            config.api_base = base.clone();
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from(["notesai", "run", "lecture4.pdf"]);
        match cli.command {
            Command::Run {
                file,
                json,
                no_generate,
            } => {
                assert_eq!(file, PathBuf::from("lecture4.pdf"));
                assert!(!json);
                assert!(!no_generate);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "notesai",
            "status",
            "doc-1",
            "--api-base",
            "http://10.0.0.5:8000",
            "--poll-interval-ms",
            "500",
            "-v",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.api_base.as_deref(), Some("http://10.0.0.5:8000"));
        assert_eq!(cli.poll_interval_ms, Some(500));
        assert!(matches!(cli.command, Command::Status { ref doc_id } if doc_id == "doc-1"));
    }

    #[test]
    fn cli_parses_notes_subcommand() {
        let cli = Cli::parse_from(["notesai", "notes", "doc-9", "--json"]);
        match cli.command {
            Command::Notes { doc_id, json } => {
                assert_eq!(doc_id, "doc-9");
                assert!(json);
            }
            _ => panic!("expected Notes command"),
        }
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let result = Cli::try_parse_from(["notesai", "status", "d", "--poll-interval-ms", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "notesai",
            "run",
            "a.pdf",
            "--no-generate",
            "--api-base",
            "http://notes.local",
        ]);
        let mut config = NotesConfig::default();
        cli.apply_to(&mut config);
        assert_eq!(config.api_base, "http://notes.local");
        assert_eq!(config.poll_interval_ms, 2000);
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
