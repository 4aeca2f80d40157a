//! Restartable, cancellable repeating probe.
//!
//! A [`Poller`] owns at most one background task. The task waits one
//! interval, calls [`PollTarget::probe`], and either hands the result to
//! [`PollTarget::on_tick`] or, when the result is terminal, stops polling and
//! runs [`PollTarget::on_terminal`] once. Probes never overlap: the next tick
//! is only awaited after the previous probe resolved, and ticks missed while
//! a slow probe was outstanding are skipped.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// What a [`Poller`] drives.
pub trait PollTarget: Send + 'static {
    type Output: Send + 'static;
    type Error: Send + 'static;

    /// One status check. At most one is outstanding at a time.
    fn probe(&mut self) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send;

    /// Whether `output` ends the polling run.
    fn is_terminal(&self, output: &Self::Output) -> bool;

    /// Every non-terminal outcome, including failed probes. Polling continues afterwards.
    fn on_tick(&mut self, result: Result<Self::Output, Self::Error>);

    /// Runs once with the terminal output. Cancelled if the poller is stopped meanwhile.
    fn on_terminal(self, output: Self::Output) -> impl Future<Output = ()> + Send;
}

#[derive(Debug)]
struct Run {
    cancel: CancellationToken,
    polling: Arc<AtomicBool>,
}

/// Handle to a (possibly running) polling task.
#[derive(Debug, Default)]
pub struct Poller {
    run: Option<Run>,
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start polling `target` every `interval`, stopping any previous run first.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<T: PollTarget>(&mut self, interval: Duration, target: T) {
        self.stop();

        let cancel = CancellationToken::new();
        let polling = Arc::new(AtomicBool::new(true));
        tokio::spawn(run(
            interval.max(Duration::from_millis(1)),
            target,
            cancel.clone(),
            polling.clone(),
        ));
        self.run = Some(Run { cancel, polling });
    }

    /// Stop the current run, if any. Safe to call any number of times.
    pub fn stop(&mut self) {
        if let Some(run) = self.run.take() {
            run.polling.store(false, Ordering::SeqCst);
            run.cancel.cancel();
        }
    }

    /// True while the run is still probing. Becomes false as soon as a
    /// terminal result is seen or `stop` is called.
    pub fn is_active(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|run| run.polling.load(Ordering::SeqCst))
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run<T: PollTarget>(
    period: Duration,
    mut target: T,
    cancel: CancellationToken,
    polling: Arc<AtomicBool>,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let terminal = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = target.probe() => result,
        };

        match result {
            Ok(output) if target.is_terminal(&output) => break output,
            other => target.on_tick(other),
        }
    };

    polling.store(false, Ordering::SeqCst);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {}
        _ = target.on_terminal(terminal) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counters {
        probes: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        terminals: AtomicUsize,
        finished: AtomicBool,
        ticks: Mutex<Vec<Result<&'static str, String>>>,
    }

    struct Scripted {
        script: VecDeque<Result<&'static str, String>>,
        probe_delay: Duration,
        terminal_delay: Duration,
        counters: Arc<Counters>,
    }

    impl Scripted {
        fn new(script: Vec<Result<&'static str, String>>) -> (Self, Arc<Counters>) {
            let counters = Arc::new(Counters::default());
            let target = Self {
                script: script.into(),
                probe_delay: Duration::ZERO,
                terminal_delay: Duration::ZERO,
                counters: counters.clone(),
            };
            (target, counters)
        }
    }

    impl PollTarget for Scripted {
        type Output = &'static str;
        type Error = String;

        async fn probe(&mut self) -> Result<&'static str, String> {
            let c = &self.counters;
            c.probes.fetch_add(1, Ordering::SeqCst);
            let now = c.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            c.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.probe_delay.is_zero() {
                time::sleep(self.probe_delay).await;
            }
            c.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.script.pop_front().unwrap_or(Ok("pending"))
        }

        fn is_terminal(&self, output: &&'static str) -> bool {
            *output == "done"
        }

        fn on_tick(&mut self, result: Result<&'static str, String>) {
            self.counters.ticks.lock().unwrap().push(result);
        }

        async fn on_terminal(self, _output: &'static str) {
            self.counters.terminals.fetch_add(1, Ordering::SeqCst);
            if !self.terminal_delay.is_zero() {
                time::sleep(self.terminal_delay).await;
            }
            self.counters.finished.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn probes_until_terminal_then_stops_itself() {
        let (target, counters) = Scripted::new(vec![Ok("pending"), Ok("pending"), Ok("done")]);
        let mut poller = Poller::new();
        poller.start(Duration::from_secs(2), target);
        assert!(poller.is_active());

        time::sleep(Duration::from_secs(20)).await;

        assert_eq!(counters.probes.load(Ordering::SeqCst), 3);
        assert_eq!(counters.ticks.lock().unwrap().len(), 2);
        assert_eq!(counters.terminals.load(Ordering::SeqCst), 1);
        assert!(counters.finished.load(Ordering::SeqCst));
        assert!(!poller.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn first_probe_waits_one_interval() {
        let (target, counters) = Scripted::new(vec![]);
        let mut poller = Poller::new();
        poller.start(Duration::from_secs(2), target);

        time::sleep(Duration::from_millis(1900)).await;
        assert_eq!(counters.probes.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counters.probes.load(Ordering::SeqCst), 1);
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_probes_keep_polling() {
        let (target, counters) = Scripted::new(vec![
            Err("connection refused".into()),
            Err("timed out".into()),
            Ok("done"),
        ]);
        let mut poller = Poller::new();
        poller.start(Duration::from_secs(2), target);

        time::sleep(Duration::from_secs(10)).await;

        let ticks = counters.ticks.lock().unwrap().clone();
        assert_eq!(
            ticks,
            vec![Err("connection refused".to_string()), Err("timed out".to_string())]
        );
        assert_eq!(counters.terminals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let mut idle = Poller::new();
        idle.stop();
        idle.stop();
        assert!(!idle.is_active());

        let (target, counters) = Scripted::new(vec![Ok("done")]);
        let mut poller = Poller::new();
        poller.start(Duration::from_secs(2), target);
        poller.stop();
        poller.stop();
        poller.stop();

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counters.probes.load(Ordering::SeqCst), 0);
        assert_eq!(counters.terminals.load(Ordering::SeqCst), 0);
        assert!(!poller.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_after_terminal_never_repeats_on_terminal() {
        let (target, counters) = Scripted::new(vec![Ok("done")]);
        let mut poller = Poller::new();
        poller.start(Duration::from_secs(2), target);

        time::sleep(Duration::from_secs(5)).await;
        poller.stop();
        poller.stop();
        time::sleep(Duration::from_secs(5)).await;

        assert_eq!(counters.terminals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_is_never_overlapped() {
        let (mut target, counters) = Scripted::new(vec![]);
        target.probe_delay = Duration::from_secs(5);
        let mut poller = Poller::new();
        poller.start(Duration::from_secs(2), target);

        time::sleep(Duration::from_secs(21)).await;
        poller.stop();

        assert_eq!(counters.max_in_flight.load(Ordering::SeqCst), 1);
        let probes = counters.probes.load(Ordering::SeqCst);
        assert!((3..=5).contains(&probes), "unexpected probe count {probes}");
    }

    #[tokio::test(start_paused = true)]
    async fn restart_stops_previous_run() {
        let (first, first_counters) = Scripted::new(vec![]);
        let (second, second_counters) = Scripted::new(vec![]);
        let mut poller = Poller::new();
        poller.start(Duration::from_secs(2), first);
        poller.start(Duration::from_secs(2), second);

        time::sleep(Duration::from_secs(7)).await;
        poller.stop();

        assert_eq!(first_counters.probes.load(Ordering::SeqCst), 0);
        assert_eq!(second_counters.probes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_pending_terminal_continuation() {
        let (mut target, counters) = Scripted::new(vec![Ok("done")]);
        target.terminal_delay = Duration::from_secs(5);
        let mut poller = Poller::new();
        poller.start(Duration::from_secs(2), target);

        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(counters.terminals.load(Ordering::SeqCst), 1);
        poller.stop();

        time::sleep(Duration::from_secs(10)).await;
        assert!(!counters.finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_poller_stops_the_task() {
        let (target, counters) = Scripted::new(vec![]);
        {
            let mut poller = Poller::new();
            poller.start(Duration::from_secs(2), target);
        }
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counters.probes.load(Ordering::SeqCst), 0);
    }
}
