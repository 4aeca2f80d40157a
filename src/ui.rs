//! Terminal output of the `notesai` binary: progress bar and rendered notes.
//!
//! [`SessionProgress`] follows a [`Session`] with an `indicatif` bar and
//! `console` colors; [`render_notes`] turns a result into Markdown.

use std::fmt::Write as _;
use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use notesai::{NotesResponse, Session, Stage};
use notesai::api::StatusResponse;

/// Progress display for one document session.
pub struct SessionProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    dim: Style,
}

impl SessionProgress {
    pub fn start(filename: &str) -> Self {
        let pb = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:<20} [{bar:30.cyan/blue}] {pos:>3}% {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        pb.set_style(style);
        pb.set_prefix(Stage::Uploading.to_string());
        pb.set_message(filename.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            dim: Style::new().dim(),
        }
    }

    /// Reflect the latest session snapshot.
    pub fn update(&self, session: &Session) {
        self.pb.set_prefix(session.stage.to_string());
        self.pb.set_position(u64::from(session.progress));
        if let Some(text) = &session.status_text {
            self.pb.set_message(text.clone());
        }
    }

    /// Clear the bar and print the outcome of a settled session.
    pub fn finish(&self, session: &Session) {
        self.pb.finish_and_clear();
        let doc = session.document_id.as_deref().unwrap_or("-");
        match session.stage {
            Stage::Ready => eprintln!(
                "  {} Document {doc} is ready for note generation",
                self.green.apply_to("✓")
            ),
            Stage::Viewing => eprintln!("  {} Notes generated for {doc}", self.green.apply_to("✓")),
            Stage::Failed => {
                let reason = session.last_error.as_deref().unwrap_or("unknown error");
                let kind = session
                    .failure
                    .map(|kind| format!(" ({kind})"))
                    .unwrap_or_default();
                eprintln!("  {} {reason}{}", self.red.apply_to("✗"), self.dim.apply_to(kind));
            }
            other => eprintln!("  {} stopped while {other}", self.dim.apply_to("•")),
        }
    }

    /// Clear the bar without printing anything.
    pub fn clear(&self) {
        self.pb.finish_and_clear();
    }

    /// Clear the bar after an interrupt.
    pub fn abandon(&self) {
        self.pb.finish_and_clear();
        eprintln!("  {} Interrupted, session reset", self.red.apply_to("✗"));
    }
}

/// One-line summary of a status read.
pub fn render_status(status: &StatusResponse) -> String {
    match &status.current_stage {
        Some(stage) => format!("{} {} {}% {stage}", status.doc_id, status.status, status.progress),
        None => format!("{} {} {}%", status.doc_id, status.status, status.progress),
    }
}

/// Render generated notes as Markdown.
pub fn render_notes(response: &NotesResponse) -> String {
    let notes = &response.notes;
    let mut out = String::new();

    let _ = writeln!(out, "# {}\n", notes.title);
    if !notes.summary.is_empty() {
        let _ = writeln!(out, "{}\n", notes.summary);
    }

    if !notes.key_terms.is_empty() {
        let _ = writeln!(out, "## Key terms\n");
        for term in &notes.key_terms {
            let _ = writeln!(out, "- **{}**: {}", term.term, term.definition);
        }
        out.push('\n');
    }

    for section in &notes.sections {
        let _ = writeln!(out, "## {}\n", section.heading);
        if !section.introduction.is_empty() {
            let _ = writeln!(out, "{}\n", section.introduction);
        }
        for sub in &section.subsections {
            let _ = writeln!(out, "### {}\n", sub.subheading);
            for point in &sub.points {
                let _ = writeln!(out, "- {point}");
            }
            for example in &sub.examples {
                let _ = writeln!(out, "- *Example:* {example}");
            }
            for formula in &sub.formulas {
                let _ = writeln!(out, "- `{}`: {}", formula.formula, formula.explanation);
            }
            out.push('\n');
        }
        for term in &section.key_terms {
            let _ = writeln!(out, "- **{}**: {}", term.term, term.definition);
        }
    }

    let _ = writeln!(out, "---\n_Generated {}_", response.generated_at);
    out
}
