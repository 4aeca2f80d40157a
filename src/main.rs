mod cli;
mod ui;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::debug;

use cli::{Cli, Command};
use notesai::{
    Document, HttpJobApi, JobApi, NotesConfig, NotesResponse, Orchestrator, Session, Stage,
    logging,
};
use ui::SessionProgress;

/// Exit status after Ctrl-C, as shells report SIGINT.
const INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = NotesConfig::load().context("failed to load notesai.toml")?;
    cli.apply_to(&mut config);
    config.validate()?;
    debug!(api_base = %config.api_base, poll_interval_ms = config.poll_interval_ms, "configuration loaded");

    let api = Arc::new(HttpJobApi::with_timeouts(
        config.api_base.clone(),
        config.timeouts(),
    )?);

    match cli.command {
        Command::Run {
            file,
            json,
            no_generate,
        } => run_document(api, &config, &file, json, no_generate).await,
        Command::Status { doc_id } => {
            let status = api.read_status(&doc_id).await?;
            println!("{}", ui::render_status(&status));
            Ok(ExitCode::SUCCESS)
        }
        Command::Notes { doc_id, json } => {
            let notes = api.fetch_result(&doc_id).await?;
            print_notes(&notes, json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_document(
    api: Arc<HttpJobApi>,
    config: &NotesConfig,
    file: &Path,
    json: bool,
    no_generate: bool,
) -> Result<ExitCode> {
    let document = Document::from_path(file)
        .await
        .with_context(|| format!("cannot read {}", file.display()))?;
    let orchestrator = Orchestrator::with_settings(api, config.orchestrator_settings());
    let progress = SessionProgress::start(document.filename());
    let mut updates = orchestrator.subscribe();

    let drive = async {
        orchestrator.submit(document).await?;
        let session = follow(&mut updates, &progress).await;
        if session.stage != Stage::Ready || no_generate {
            return Ok(session);
        }
        orchestrator.generate().await?;
        Ok::<_, notesai::ActionError>(follow(&mut updates, &progress).await)
    };

    let outcome = tokio::select! {
        outcome = drive => outcome,
        _ = tokio::signal::ctrl_c() => {
            orchestrator.reset();
            progress.abandon();
            return Ok(ExitCode::from(INTERRUPTED));
        }
    };
    let session = match outcome {
        Ok(session) => session,
        Err(err) => {
            progress.clear();
            return Err(err.into());
        }
    };
    progress.finish(&session);

    match (&session.stage, &session.result) {
        (Stage::Viewing, Some(notes)) => {
            print_notes(notes, json)?;
            Ok(ExitCode::SUCCESS)
        }
        (Stage::Ready, _) => {
            if let Some(doc_id) = &session.document_id {
                println!("{doc_id}");
            }
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::FAILURE),
    }
}

/// Mirror session changes onto the progress bar until the session settles.
async fn follow(updates: &mut watch::Receiver<Session>, progress: &SessionProgress) -> Session {
    loop {
        let session = updates.borrow_and_update().clone();
        progress.update(&session);
        if session.stage.is_settled() || updates.changed().await.is_err() {
            return session;
        }
    }
}

fn print_notes(notes: &NotesResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(notes)?);
    } else {
        print!("{}", ui::render_notes(notes));
    }
    Ok(())
}
