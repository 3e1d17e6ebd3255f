use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::state::{TrackerState, TrackerView, Transition};
use crate::api::JobApi;
use crate::job::{JobId, JobKind};

/// Default delay between two status fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Starts independent poll loops, one per tracked job.
pub struct JobTracker<A> {
    api: Arc<A>,
    interval: Duration,
}

impl<A> Clone for JobTracker<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            interval: self.interval,
        }
    }
}

impl<A: JobApi + 'static> JobTracker<A> {
    pub fn new(api: Arc<A>, interval: Duration) -> Self {
        Self { api, interval }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Begin polling `job_id`: one fetch now, then one per interval until the
    /// job is done, a fetch fails fatally, or the subscription is stopped.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(&self, job_id: JobId, kind: JobKind) -> Subscription {
        let (tx, rx) = watch::channel(TrackerView::polling(job_id.clone()));
        let tx = Arc::new(tx);
        let cancel = CancellationToken::new();

        tracing::info!(%job_id, %kind, interval_ms = self.interval.as_millis() as u64, "Tracking job");
        tokio::spawn(poll_loop(
            Arc::clone(&self.api),
            job_id.clone(),
            kind,
            self.interval,
            Arc::clone(&tx),
            cancel.clone(),
        ));

        Subscription {
            job_id,
            rx,
            tx: Arc::downgrade(&tx),
            cancel,
        }
    }
}

async fn poll_loop<A: JobApi>(
    api: Arc<A>,
    job_id: JobId,
    kind: JobKind,
    interval: Duration,
    tx: Arc<watch::Sender<TrackerView>>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        // At most one fetch in flight: the next tick is awaited only after
        // this one resolves.
        let fetched = tokio::select! {
            _ = cancel.cancelled() => return,
            fetched = api.status(&job_id, kind) => fetched,
        };

        let mut transition = Transition::Ignored;
        tx.send_if_modified(|view| {
            // Checked under the channel lock so a concurrent stop() wins.
            if cancel.is_cancelled() {
                return false;
            }
            transition = view.apply(fetched);
            transition != Transition::Ignored
        });

        match transition {
            Transition::Continue => {
                let view = tx.borrow();
                tracing::debug!(
                    %job_id,
                    attempts = view.attempts,
                    awaiting_session = view.awaiting_session,
                    completed = view.latest.as_ref().map(|j| j.completed),
                    "Job polled"
                );
            }
            Transition::Complete => {
                tracing::info!(%job_id, "Job finished");
                return;
            }
            Transition::Fail => {
                let error = tx.borrow().error.clone().unwrap_or_default();
                tracing::error!(%job_id, %error, "Stopped tracking job after fetch error");
                return;
            }
            Transition::Ignored => return,
        }
    }
}

/// Handle to one running poll loop.
///
/// Dropping the subscription stops the loop; a fetch that resolves after that
/// is discarded.
pub struct Subscription {
    job_id: JobId,
    rx: watch::Receiver<TrackerView>,
    tx: Weak<watch::Sender<TrackerView>>,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn view(&self) -> TrackerView {
        self.rx.borrow().clone()
    }

    pub fn state(&self) -> TrackerState {
        self.rx.borrow().state
    }

    /// Wait for the next published view. `None` once the loop has ended and
    /// every view has been seen.
    pub async fn changed(&mut self) -> Option<TrackerView> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the tracker leaves `Polling`.
    pub async fn wait_terminal(&mut self) -> TrackerView {
        loop {
            {
                let view = self.rx.borrow_and_update();
                if view.state != TrackerState::Polling {
                    return view.clone();
                }
            }
            if self.rx.changed().await.is_err() {
                return self.view();
            }
        }
    }

    /// Cancel the pending tick and any in-flight fetch. Idempotent; from a
    /// terminal state it changes nothing.
    pub fn stop(&self) {
        // Upgrade first so the loop cannot drop the sender between the
        // cancellation and the state change.
        let tx = self.tx.upgrade();
        self.cancel.cancel();
        if let Some(tx) = tx
            && tx.send_if_modified(TrackerView::stop)
        {
            tracing::debug!(job_id = %self.job_id, "Tracking stopped");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ItemResult, JobStatus};
    use crate::testing::{ScriptedApi, Step, job};
    use tokio::time::{Instant, sleep};

    fn running(completed: u32) -> Step {
        Step::Snapshot(job(
            "J1",
            JobStatus::Running,
            3,
            (1..=completed).map(|i| ItemResult::success(i.to_string())).collect(),
        ))
    }

    fn done() -> Step {
        Step::Snapshot(job(
            "J1",
            JobStatus::Done,
            3,
            vec![
                ItemResult::success("1"),
                ItemResult::failure("2", "Erro timeout"),
                ItemResult::failure("3", "E-mail não preenchido"),
            ],
        ))
    }

    fn tracker(api: &Arc<ScriptedApi>) -> JobTracker<ScriptedApi> {
        JobTracker::new(Arc::clone(api), DEFAULT_POLL_INTERVAL)
    }

    #[tokio::test(start_paused = true)]
    async fn stops_fetching_after_done() {
        let api = Arc::new(ScriptedApi::new(vec![running(1), done()]));
        let mut sub = tracker(&api).start(JobId::new("J1"), JobKind::InvoiceEmail);

        let view = sub.wait_terminal().await;
        assert_eq!(view.state, TrackerState::Done);
        assert_eq!(view.latest.unwrap().results.len(), 3);

        sleep(Duration::from_secs(20)).await;
        assert_eq!(api.status_calls(), 2);

        // stop() after natural termination has no observable effect.
        sub.stop();
        sub.stop();
        assert_eq!(sub.state(), TrackerState::Done);
        assert_eq!(sub.view().attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_immediately_then_every_interval() {
        let api = Arc::new(ScriptedApi::new(vec![
            running(0),
            running(1),
            running(2),
            done(),
        ]));
        let started = Instant::now();
        let mut sub = tracker(&api).start(JobId::new("J1"), JobKind::InvoiceEmail);

        let first = sub.changed().await.unwrap();
        assert_eq!(first.attempts, 1);
        assert!(started.elapsed() < Duration::from_millis(100));

        let view = sub.wait_terminal().await;
        assert_eq!(view.state, TrackerState::Done);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(6500), "elapsed {elapsed:?}");
        assert_eq!(api.status_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_poll_keeps_tracking() {
        let api = Arc::new(ScriptedApi::new(vec![
            running(1),
            Step::Unauthorized,
            Step::Unauthorized,
            done(),
        ]));
        let mut sub = tracker(&api).start(JobId::new("J1"), JobKind::InvoiceEmail);

        let first = sub.changed().await.unwrap();
        assert_eq!(first.latest.as_ref().unwrap().completed, 1);

        let second = sub.changed().await.unwrap();
        assert_eq!(second.state, TrackerState::Polling);
        assert!(second.awaiting_session);
        assert!(second.error.is_none());
        assert_eq!(second.latest, first.latest);

        let view = sub.wait_terminal().await;
        assert_eq!(view.state, TrackerState::Done);
        assert!(!view.awaiting_session);
        assert_eq!(api.status_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_stops_tracking() {
        let api = Arc::new(ScriptedApi::new(vec![running(1), Step::Fail(404), done()]));
        let mut sub = tracker(&api).start(JobId::new("J1"), JobKind::InvoiceEmail);

        let view = sub.wait_terminal().await;
        assert_eq!(view.state, TrackerState::Errored);
        assert!(view.error.unwrap().contains("not found"));
        // Progress as of the last good snapshot.
        assert_eq!(view.latest.unwrap().completed, 1);

        sleep(Duration::from_secs(20)).await;
        assert_eq!(api.status_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_discards_in_flight_fetch() {
        let slow = job("J1", JobStatus::Done, 1, vec![ItemResult::success("1")]);
        let api = Arc::new(ScriptedApi::new(vec![Step::Delayed(
            Duration::from_secs(5),
            slow,
        )]));
        let sub = tracker(&api).start(JobId::new("J1"), JobKind::InvoiceEmail);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(api.status_calls(), 1);
        sub.stop();
        assert_eq!(sub.state(), TrackerState::Idle);

        sleep(Duration::from_secs(30)).await;
        let view = sub.view();
        assert_eq!(view.state, TrackerState::Idle);
        assert!(view.latest.is_none());
        assert_eq!(view.attempts, 0);
        assert_eq!(api.status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_subscription_stops_polling() {
        let api = Arc::new(ScriptedApi::new(vec![running(1)]));
        let mut sub = tracker(&api).start(JobId::new("J1"), JobKind::InvoiceEmail);
        sub.changed().await.unwrap();
        drop(sub);

        sleep(Duration::from_secs(20)).await;
        assert_eq!(api.status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn trackers_are_independent() {
        let api = Arc::new(ScriptedApi::new(vec![running(1), done(), done()]));
        let t = tracker(&api);
        let mut a = t.start(JobId::new("A"), JobKind::InvoiceEmail);
        let mut b = t.start(JobId::new("B"), JobKind::Authorization);

        let va = a.wait_terminal().await;
        let vb = b.wait_terminal().await;
        assert_eq!(va.job_id.as_str(), "A");
        assert_eq!(vb.job_id.as_str(), "B");
        assert_eq!(va.latest.unwrap().id.as_str(), "A");
        assert_eq!(vb.latest.unwrap().kind, JobKind::Authorization);
    }
}
