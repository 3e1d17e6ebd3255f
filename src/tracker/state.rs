use std::fmt;

use serde::Serialize;

use crate::api::ApiError;
use crate::job::{Job, JobId};

/// The four states of a job tracker.
///
/// `Idle → Polling → {Done, Errored}`; `stop()` returns a polling tracker to
/// `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackerState {
    Idle,
    Polling,
    Done,
    Errored,
}

impl TrackerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TrackerState::Done | TrackerState::Errored)
    }
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerState::Idle => write!(f, "IDLE"),
            TrackerState::Polling => write!(f, "POLLING"),
            TrackerState::Done => write!(f, "DONE"),
            TrackerState::Errored => write!(f, "ERRORED"),
        }
    }
}

/// What the poll loop should do after a fetch has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Schedule the next fetch.
    Continue,
    /// The job reached `Done`; stop scheduling.
    Complete,
    /// A non-recoverable fetch error; stop scheduling.
    Fail,
    /// The tracker was not polling; the fetch was discarded.
    Ignored,
}

/// Everything a caller can observe about one tracked job.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerView {
    pub job_id: JobId,
    pub state: TrackerState,
    /// Last successful snapshot. Never replaced by a failed fetch.
    pub latest: Option<Job>,
    /// Message of the error that moved the tracker to `Errored`.
    pub error: Option<String>,
    /// The last fetch was rejected for lack of a valid session.
    pub awaiting_session: bool,
    /// Fetches resolved so far, successful or not.
    pub attempts: u32,
}

impl TrackerView {
    pub fn idle(job_id: JobId) -> Self {
        Self {
            job_id,
            state: TrackerState::Idle,
            latest: None,
            error: None,
            awaiting_session: false,
            attempts: 0,
        }
    }

    pub fn polling(job_id: JobId) -> Self {
        Self {
            state: TrackerState::Polling,
            ..Self::idle(job_id)
        }
    }

    /// Apply the outcome of one fetch.
    ///
    /// - A snapshot overwrites `latest` in full; a `Done` snapshot completes.
    /// - `Unauthorized` keeps polling and leaves `latest` untouched.
    /// - Any other error moves to `Errored`.
    /// - Outside `Polling` the fetch is discarded.
    pub fn apply(&mut self, fetched: Result<Job, ApiError>) -> Transition {
        if self.state != TrackerState::Polling {
            return Transition::Ignored;
        }
        self.attempts += 1;

        match fetched {
            Ok(job) => {
                self.awaiting_session = false;
                let done = job.is_done();
                self.latest = Some(job);
                if done {
                    self.state = TrackerState::Done;
                    Transition::Complete
                } else {
                    Transition::Continue
                }
            }
            Err(e) if e.is_unauthorized() => {
                self.awaiting_session = true;
                Transition::Continue
            }
            Err(e) => {
                self.state = TrackerState::Errored;
                self.error = Some(e.to_string());
                Transition::Fail
            }
        }
    }

    /// `Polling → Idle`; terminal and idle views are left as they are.
    /// Returns whether the view changed.
    pub fn stop(&mut self) -> bool {
        if self.state == TrackerState::Polling {
            self.state = TrackerState::Idle;
            self.awaiting_session = false;
            true
        } else {
            false
        }
    }
}
