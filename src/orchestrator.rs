use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{
    ApiError, GenerateResponse, JobApi, JobStatus, NotesResponse, StatusResponse, UploadResponse,
};
use crate::document::{Document, DocumentRules};
use crate::error::ActionError;
use crate::poller::{PollTarget, Poller};
use crate::state_machine::{
    Event, FailureKind, InvalidTransition, Session, SessionToken, Stage, StateMachine,
};

/// Polling cadence used for both phases unless configured otherwise.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Which remote job a poller is watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Processing,
    Generation,
}

impl Phase {
    /// `ready` ends processing, `completed` ends generation, `failed` ends both.
    pub fn is_terminal(self, status: JobStatus) -> bool {
        match self {
            Phase::Processing => matches!(status, JobStatus::Ready | JobStatus::Failed),
            Phase::Generation => matches!(status, JobStatus::Completed | JobStatus::Failed),
        }
    }

    fn stage(self) -> Stage {
        match self {
            Phase::Processing => Stage::Processing,
            Phase::Generation => Stage::Generating,
        }
    }

    fn failed_event(self) -> Event {
        match self {
            Phase::Processing => Event::ProcessingFailed,
            Phase::Generation => Event::GenerationFailed,
        }
    }

    fn fallback_failure(self) -> &'static str {
        match self {
            Phase::Processing => "Processing failed",
            Phase::Generation => "Generation failed",
        }
    }
}

/// Knobs of the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub poll_interval: Duration,
    pub rules: DocumentRules,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            rules: DocumentRules::default(),
        }
    }
}

struct Inner {
    session: Session,
    poller: Poller,
    /// Cancels the action tasks started for the current session.
    cancel: CancellationToken,
}

impl Inner {
    /// Leave the current session through `event` (`Reset` or `Retry`):
    /// stop everything bound to it and start a blank one.
    fn restart(&mut self, event: Event) -> Result<(), InvalidTransition> {
        StateMachine::next(self.session.stage, event)?;
        self.poller.stop();
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.session = Session::new();
        Ok(())
    }
}

struct Shared<A> {
    api: Arc<A>,
    settings: OrchestratorSettings,
    inner: Mutex<Inner>,
    updates: watch::Sender<Session>,
}

/// Drives one document through upload, processing, generation and viewing.
///
/// The orchestrator is the only writer of the [`Session`]. Presentation code
/// reads it through [`snapshot`](Self::snapshot) or [`subscribe`](Self::subscribe)
/// and changes it only through the four actions.
pub struct Orchestrator<A: JobApi> {
    shared: Arc<Shared<A>>,
}

impl<A: JobApi> Orchestrator<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self::with_settings(api, OrchestratorSettings::default())
    }

    pub fn with_settings(api: Arc<A>, settings: OrchestratorSettings) -> Self {
        let session = Session::new();
        let (updates, _) = watch::channel(session.clone());
        Self {
            shared: Arc::new(Shared {
                api,
                settings,
                inner: Mutex::new(Inner {
                    session,
                    poller: Poller::new(),
                    cancel: CancellationToken::new(),
                }),
                updates,
            }),
        }
    }

    /// Current session state.
    pub fn snapshot(&self) -> Session {
        self.shared.lock().session.clone()
    }

    /// Receiver that observes every published session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.shared.updates.subscribe()
    }

    /// Wait until the session satisfies `predicate` and return that state.
    pub async fn wait_until<F>(&self, mut predicate: F) -> Session
    where
        F: FnMut(&Session) -> bool,
    {
        let mut updates = self.subscribe();
        let result = updates.wait_for(|session| predicate(session)).await;
        match result {
            Ok(session) => session.clone(),
            Err(_) => self.snapshot(),
        }
    }

    /// Whether a poller is currently probing the server.
    pub fn is_polling(&self) -> bool {
        self.shared.lock().poller.is_active()
    }

    /// Upload `document`, replacing whatever session was in progress.
    ///
    /// Returns once the upload resolved. On success the session is in
    /// `Processing` with a poller running; on a remote failure it is in
    /// `Failed`. Only an invalid document is reported as an error, and then
    /// the session is left untouched.
    pub async fn submit(&self, document: Document) -> Result<(), ActionError> {
        document.validate(&self.shared.settings.rules)?;

        let (token, cancel) = {
            let mut inner = self.shared.lock();
            if inner.session.stage != Stage::Idle {
                info!(stage = %inner.session.stage, "replacing current session with a new upload");
            }
            inner.restart(Event::Reset)?;
            inner.session.apply(Event::DocumentSelected)?;
            inner.session.filename = Some(document.filename().to_string());
            self.shared.publish(&inner.session);
            (inner.session.token(), inner.cancel.clone())
        };

        info!(filename = document.filename(), bytes = document.len(), "uploading document");
        let shared = self.shared.clone();
        settle(tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                outcome = shared.api.submit_document(&document) => outcome,
            };
            shared.finish_upload(&token, outcome);
        }))
        .await;
        Ok(())
    }

    /// Start note generation for a `Ready` document.
    pub async fn generate(&self) -> Result<(), ActionError> {
        let (token, cancel, doc_id) = {
            let mut inner = self.shared.lock();
            let stage = inner.session.stage;
            let doc_id = inner.session.document_id.clone().ok_or(InvalidTransition {
                stage,
                event: Event::GenerateRequested,
            })?;
            inner.session.apply(Event::GenerateRequested)?;
            inner.session.last_error = None;
            self.shared.publish(&inner.session);
            (inner.session.token(), inner.cancel.clone(), doc_id)
        };

        info!(doc_id = %doc_id, "requesting note generation");
        let shared = self.shared.clone();
        settle(tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                outcome = shared.api.start_generation(&doc_id) => outcome,
            };
            shared.finish_generation_start(&token, outcome);
        }))
        .await;
        Ok(())
    }

    /// Leave `Failed` for a blank `Idle` session.
    pub fn retry(&self) -> Result<(), ActionError> {
        let mut inner = self.shared.lock();
        inner.restart(Event::Retry)?;
        self.shared.publish(&inner.session);
        info!("session cleared for retry");
        Ok(())
    }

    /// Abandon the current session from any stage.
    pub fn reset(&self) {
        let mut inner = self.shared.lock();
        let previous = inner.session.stage;
        if let Err(err) = inner.restart(Event::Reset) {
            warn!(%err, "reset refused");
            return;
        }
        self.shared.publish(&inner.session);
        info!(from = %previous, "session reset");
    }

    /// Stop the poller and any in-flight action without touching the session.
    pub fn shutdown(&self) {
        let mut inner = self.shared.lock();
        inner.poller.stop();
        inner.cancel.cancel();
    }
}

impl<A: JobApi> Drop for Orchestrator<A> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Await an action task. Cancellation is a normal outcome; panics propagate.
async fn settle(task: JoinHandle<()>) {
    match task.await {
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        _ => {}
    }
}

impl<A: JobApi> Shared<A> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, session: &Session) {
        debug!(
            stage = %session.stage,
            progress = session.progress,
            doc_id = session.document_id.as_deref().unwrap_or("-"),
            "session updated"
        );
        self.updates.send_replace(session.clone());
    }

    /// Lock the session for applying a response, or `None` if `token` is stale.
    fn lock_current(&self, token: &SessionToken, what: &str) -> Option<MutexGuard<'_, Inner>> {
        let inner = self.lock();
        if inner.session.is_current(token) {
            Some(inner)
        } else {
            debug!(
                doc_id = token.document_id.as_deref().unwrap_or("-"),
                "discarding {what} for a replaced session"
            );
            None
        }
    }

    fn start_poller(self: &Arc<Self>, inner: &mut Inner, doc_id: String, phase: Phase) {
        let target = PhasePoll {
            shared: self.clone(),
            token: inner.session.token(),
            doc_id,
            phase,
        };
        inner.poller.start(self.settings.poll_interval, target);
    }

    fn finish_upload(self: &Arc<Self>, token: &SessionToken, outcome: Result<UploadResponse, ApiError>) {
        let Some(mut inner) = self.lock_current(token, "upload response") else {
            return;
        };

        match outcome {
            Ok(upload) => {
                if let Err(err) = inner.session.apply(Event::UploadSucceeded) {
                    warn!(%err, "ignoring upload response");
                    return;
                }
                info!(doc_id = %upload.doc_id, "document uploaded, processing started");
                inner.session.document_id = Some(upload.doc_id.clone());
                if !upload.message.is_empty() {
                    inner.session.status_text = Some(upload.message);
                }
                self.start_poller(&mut inner, upload.doc_id, Phase::Processing);
            }
            Err(err) => {
                warn!(%err, "upload failed");
                let kind = FailureKind::of(&err);
                if let Err(err) = inner.session.fail(Event::UploadFailed, kind, err.to_string()) {
                    warn!(%err, "ignoring upload failure");
                    return;
                }
            }
        }
        self.publish(&inner.session);
    }

    fn finish_generation_start(
        self: &Arc<Self>,
        token: &SessionToken,
        outcome: Result<GenerateResponse, ApiError>,
    ) {
        let Some(mut inner) = self.lock_current(token, "generation response") else {
            return;
        };

        match outcome {
            Ok(started) => {
                if let Err(err) = inner.session.apply(Event::GenerationStarted) {
                    warn!(%err, "ignoring generation response");
                    return;
                }
                info!(doc_id = %started.doc_id, "note generation started");
                inner.session.progress = 0;
                if !started.message.is_empty() {
                    inner.session.status_text = Some(started.message);
                }
                match inner.session.document_id.clone() {
                    Some(doc_id) => self.start_poller(&mut inner, doc_id, Phase::Generation),
                    None => warn!("generating session has no document id"),
                }
            }
            Err(err) => {
                warn!(%err, "could not start note generation");
                let kind = FailureKind::of(&err);
                if let Err(err) =
                    inner
                        .session
                        .fail(Event::GenerationStartFailed, kind, err.to_string())
                {
                    warn!(%err, "ignoring generation failure");
                    return;
                }
            }
        }
        self.publish(&inner.session);
    }

    fn apply_tick(&self, token: &SessionToken, phase: Phase, result: Result<StatusResponse, ApiError>) {
        let status = match result {
            Ok(status) => status,
            Err(err) => {
                warn!(
                    %err,
                    doc_id = token.document_id.as_deref().unwrap_or("-"),
                    "status check failed, retrying on next tick"
                );
                return;
            }
        };

        let Some(mut inner) = self.lock_current(token, "status") else {
            return;
        };
        if inner.session.stage != phase.stage() {
            debug!(stage = %inner.session.stage, "discarding status outside its polling phase");
            return;
        }
        debug!(status = %status.status, progress = status.progress, "status tick");
        inner.session.record_status(&status);
        self.publish(&inner.session);
    }

    fn fail_phase(&self, token: &SessionToken, phase: Phase, kind: FailureKind, message: String) {
        let Some(mut inner) = self.lock_current(token, "job failure") else {
            return;
        };
        warn!(error = %message, ?phase, "remote job failed");
        inner.poller.stop();
        if let Err(err) = inner.session.fail(phase.failed_event(), kind, message) {
            warn!(%err, "ignoring job failure");
            return;
        }
        self.publish(&inner.session);
    }

    async fn finish_phase(self: Arc<Self>, token: SessionToken, doc_id: String, phase: Phase, status: StatusResponse) {
        if status.status == JobStatus::Failed {
            let message = status
                .current_stage
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| phase.fallback_failure().to_string());
            self.fail_phase(&token, phase, FailureKind::Job, message);
            return;
        }

        match phase {
            Phase::Processing => {
                let Some(mut inner) = self.lock_current(&token, "ready status") else {
                    return;
                };
                inner.poller.stop();
                inner.session.record_status(&status);
                if let Err(err) = inner.session.apply(Event::ProcessingReady) {
                    warn!(%err, "ignoring ready status");
                    return;
                }
                info!(doc_id = %doc_id, "document ready for generation");
                self.publish(&inner.session);
            }
            Phase::Generation => {
                {
                    let Some(mut inner) = self.lock_current(&token, "completed status") else {
                        return;
                    };
                    inner.session.record_status(&status);
                    self.publish(&inner.session);
                }

                let fetched = self.api.fetch_result(&doc_id).await;
                self.attach_result(&token, &doc_id, fetched);
            }
        }
    }

    fn attach_result(&self, token: &SessionToken, doc_id: &str, fetched: Result<NotesResponse, ApiError>) {
        let notes = match fetched {
            Ok(notes) if notes.doc_id == doc_id => notes,
            Ok(notes) => {
                let message = format!("received notes for {} instead of {doc_id}", notes.doc_id);
                self.fail_phase(token, Phase::Generation, FailureKind::Remote, message);
                return;
            }
            Err(err) => {
                let kind = FailureKind::of(&err);
                self.fail_phase(token, Phase::Generation, kind, err.to_string());
                return;
            }
        };

        let Some(mut inner) = self.lock_current(token, "notes") else {
            return;
        };
        inner.poller.stop();
        if let Err(err) = inner.session.apply(Event::GenerationCompleted) {
            warn!(%err, "ignoring fetched notes");
            return;
        }
        info!(doc_id = %doc_id, title = %notes.notes.title, "notes ready");
        inner.session.progress = 100;
        inner.session.result = Some(notes);
        self.publish(&inner.session);
    }
}

/// Poll target for one phase of one session.
struct PhasePoll<A> {
    shared: Arc<Shared<A>>,
    token: SessionToken,
    doc_id: String,
    phase: Phase,
}

impl<A: JobApi> PollTarget for PhasePoll<A> {
    type Output = StatusResponse;
    type Error = ApiError;

    async fn probe(&mut self) -> Result<StatusResponse, ApiError> {
        self.shared.api.read_status(&self.doc_id).await
    }

    fn is_terminal(&self, output: &StatusResponse) -> bool {
        self.phase.is_terminal(output.status)
    }

    fn on_tick(&mut self, result: Result<StatusResponse, ApiError>) {
        self.shared.apply_tick(&self.token, self.phase, result);
    }

    async fn on_terminal(self, output: StatusResponse) {
        self.shared
            .finish_phase(self.token, self.doc_id, self.phase, output)
            .await;
    }
}
