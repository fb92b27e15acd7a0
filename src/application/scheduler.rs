//! Completion scanner and the interval runner that drives it.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::application::certificates::{CertificateService, IssueOptions};
use crate::application::repos::EventsRepo;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Events found finished with certificates still pending.
    pub due: usize,
    /// Events whose issuance run completed, whether or not anything was sent.
    pub processed: usize,
    /// Events whose issuance run returned an error.
    pub failed: usize,
    pub certificates_sent: u64,
}

/// Finds events that have ended and issues their certificates.
#[derive(Clone)]
pub struct CompletionScanner {
    events: Arc<dyn EventsRepo>,
    certificates: Arc<CertificateService>,
}

impl CompletionScanner {
    pub fn new(events: Arc<dyn EventsRepo>, certificates: Arc<CertificateService>) -> Self {
        Self {
            events,
            certificates,
        }
    }

    pub async fn run_tick(&self) -> ScanSummary {
        self.run_tick_at(OffsetDateTime::now_utc()).await
    }

    /// Process every event due at `now`. Never fails; problems are logged and counted.
    pub async fn run_tick_at(&self, now: OffsetDateTime) -> ScanSummary {
        counter!("eventhub_scheduler_ticks_total").increment(1);
        let started = Instant::now();

        let due = match self.events.list_due_events(now).await {
            Ok(due) => due,
            Err(err) => {
                error!(
                    target = "eventhub::scheduler",
                    error = %err,
                    "failed to list completed events"
                );
                return ScanSummary::default();
            }
        };

        let mut summary = ScanSummary {
            due: due.len(),
            ..ScanSummary::default()
        };

        if due.is_empty() {
            debug!(target = "eventhub::scheduler", "no completed events pending");
            return summary;
        }

        for event in due {
            match self
                .certificates
                .issue_for_event(event.id, IssueOptions::default())
                .await
            {
                Ok(report) => {
                    summary.processed += 1;
                    summary.certificates_sent += report.sent;
                    if report.sent == 0 && report.total > 0 {
                        warn!(
                            target = "eventhub::scheduler",
                            event_id = %event.id,
                            failed = report.failed,
                            "no certificates delivered; event stays pending"
                        );
                    }
                }
                Err(err) => {
                    summary.failed += 1;
                    counter!("eventhub_scheduler_event_failures_total").increment(1);
                    warn!(
                        target = "eventhub::scheduler",
                        event_id = %event.id,
                        error = %err,
                        "certificate issuance failed for completed event"
                    );
                }
            }
        }

        histogram!("eventhub_scheduler_tick_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        info!(
            target = "eventhub::scheduler",
            due = summary.due,
            processed = summary.processed,
            failed = summary.failed,
            sent = summary.certificates_sent,
            "completion scan finished"
        );

        summary
    }
}

/// Runs an async callback on a fixed cadence until stopped.
///
/// The first run happens one full interval after [`PeriodicTask::start`]. Runs never overlap:
/// a slow callback delays the following tick instead of stacking up. Stopping only interrupts
/// the wait between ticks; a run already in progress always completes.
pub struct PeriodicTask {
    name: &'static str,
    stop: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn start<F, Fut>(name: &'static str, interval: Duration, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        info!(
            target = "eventhub::scheduler",
            task = name,
            interval_secs = interval.as_secs(),
            "periodic task started"
        );

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // Skip the first immediate tick
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_rx.changed() => break,
                }
                debug!(target = "eventhub::scheduler", task = name, "tick");
                callback().await;
            }
            debug!(target = "eventhub::scheduler", task = name, "loop exited");
        });

        Self {
            name,
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        self.stop.is_some()
            && self
                .handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancel future runs without waiting. A run in progress finishes in the background.
    pub fn stop(&mut self) {
        if self.signal_stop() {
            // Detach: dropping the handle does not cancel the task.
            self.handle.take();
            info!(
                target = "eventhub::scheduler",
                task = self.name,
                "periodic task stopped"
            );
        }
    }

    /// Cancel future runs and wait for any run in progress to complete.
    pub async fn shutdown(mut self) {
        self.signal_stop();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                warn!(
                    target = "eventhub::scheduler",
                    task = self.name,
                    error = %err,
                    "periodic task ended abnormally"
                );
            }
            info!(
                target = "eventhub::scheduler",
                task = self.name,
                "periodic task stopped"
            );
        }
    }

    fn signal_stop(&mut self) -> bool {
        match self.stop.take() {
            Some(stop) => {
                let _ = stop.send(true);
                true
            }
            None => false,
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting_task(interval: Duration) -> (PeriodicTask, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let task = PeriodicTask::start("test", interval, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (task, runs)
    }

    #[tokio::test(start_paused = true)]
    async fn first_run_waits_one_full_interval() {
        let (_task, runs) = counting_task(Duration::from_secs(600));

        tokio::time::sleep(Duration::from_secs(599)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_runs() {
        let (mut task, runs) = counting_task(Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(task.is_running());

        task.stop();
        assert!(!task.is_running());

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_runs_do_not_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (active_handle, peak_handle) = (active.clone(), peak.clone());

        let task = PeriodicTask::start("slow", Duration::from_secs(1), move || {
            let active = active_handle.clone();
            let peak = peak_handle.clone();
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(30)).await;
        task.shutdown().await;

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_the_run_in_progress() {
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let (started_handle, finished_handle) = (started.clone(), finished.clone());

        let task = PeriodicTask::start("drain", Duration::from_secs(10), move || {
            let started = started_handle.clone();
            let finished = finished_handle.clone();
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(5)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        task.shutdown().await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_lets_the_current_run_finish() {
        let finished = Arc::new(AtomicUsize::new(0));
        let finished_handle = finished.clone();

        let mut task = PeriodicTask::start("detach", Duration::from_secs(10), move || {
            let finished = finished_handle.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(12)).await;
        task.stop();
        drop(task);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
