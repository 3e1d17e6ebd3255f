use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::{CandidateItem, JobApi};
use crate::classifier::{ClassificationRules, ResultSummary};
use crate::config::JobtrackConfig;
use crate::error::JobtrackError;
use crate::job::{Job, JobId, JobKind, JobSummary};
use crate::retry::{RetryCoordinator, RetryRequest};
use crate::selection::PaginatedList;
use crate::tracker::{JobTracker, TrackerState, TrackerView};
use crate::ui::{self, JobProgress};

/// Final state of a tracked job, with its triage.
#[derive(Debug)]
pub struct JobReport {
    pub job: Job,
    pub summary: ResultSummary,
    /// Present only when the job has technical failures to retry.
    pub retry: Option<RetryRequest>,
}

/// Drives the select → submit → track → retry cycle against one backend.
pub struct JobOrchestrator<A> {
    api: Arc<A>,
    tracker: JobTracker<A>,
    coordinator: RetryCoordinator<A>,
    page_size: usize,
    /// Render progress bars and tables on the terminal.
    pub interactive: bool,
}

impl<A: JobApi + 'static> JobOrchestrator<A> {
    pub fn new(api: Arc<A>, config: &JobtrackConfig) -> Self {
        Self {
            tracker: JobTracker::new(Arc::clone(&api), config.poll_interval()),
            coordinator: RetryCoordinator::new(
                Arc::clone(&api),
                config.exemption_rules.clone(),
                config.retry_strategy,
            ),
            api,
            page_size: config.page_size,
            interactive: true,
        }
    }

    /// Create a non-interactive orchestrator (no terminal output).
    pub fn quiet(api: Arc<A>, config: &JobtrackConfig) -> Self {
        Self {
            interactive: false,
            ..Self::new(api, config)
        }
    }

    pub fn rules(&self) -> &ClassificationRules {
        self.coordinator.rules()
    }

    /// Run a search and load it into a fresh list; any previous selection is gone.
    pub async fn search(
        &self,
        kind: JobKind,
        filters: &[(String, String)],
    ) -> Result<PaginatedList<CandidateItem>, JobtrackError> {
        let rows = self.api.search(kind, filters).await?;
        tracing::info!(%kind, found = rows.len(), "Search finished");
        let mut list = PaginatedList::new(self.page_size);
        list.replace_rows(rows);
        Ok(list)
    }

    /// Submit the list's current selection as a new job.
    pub async fn submit_selection(
        &self,
        kind: JobKind,
        list: &PaginatedList<CandidateItem>,
    ) -> Result<JobId, JobtrackError> {
        let rows = list.selected_rows();
        if rows.is_empty() {
            return Err(JobtrackError::NothingSelected);
        }
        Ok(self.api.submit_rows(kind, &rows).await?)
    }

    /// Track `job_id` until it finishes, the tracker errors, or Ctrl-C.
    pub async fn watch(&self, job_id: JobId, kind: JobKind) -> Result<JobReport, JobtrackError> {
        let mut sub = self.tracker.start(job_id.clone(), kind);
        let progress = self.interactive.then(|| JobProgress::start(&sub.view()));

        let view = loop {
            tokio::select! {
                changed = sub.changed() => match changed {
                    Some(view) => {
                        if let Some(p) = &progress {
                            p.update(&view);
                        }
                        if view.state != TrackerState::Polling {
                            break view;
                        }
                    }
                    None => break sub.view(),
                },
                _ = tokio::signal::ctrl_c() => {
                    sub.stop();
                    break sub.view();
                }
            }
        };
        if let Some(p) = &progress {
            p.finish(&view);
        }

        self.report(view)
    }

    fn report(&self, view: TrackerView) -> Result<JobReport, JobtrackError> {
        match (view.state, view.latest) {
            (TrackerState::Done, Some(job)) => {
                let summary = ResultSummary::of(&job, self.rules());
                let retry = self.coordinator.build_retry_request(&job);
                if self.interactive {
                    ui::print_results(&job, self.rules());
                    ui::print_summary(&job, &summary, retry.is_some());
                }
                Ok(JobReport {
                    job,
                    summary,
                    retry,
                })
            }
            (TrackerState::Errored, _) => Err(JobtrackError::Tracking {
                job_id: view.job_id,
                message: view.error.unwrap_or_default(),
            }),
            _ => Err(JobtrackError::Stopped(view.job_id)),
        }
    }

    /// Watch a job and, while technical failures remain, retry them and watch
    /// the new job, at most `max_retries` times. Returns one report per job.
    pub async fn watch_with_retries(
        &self,
        job_id: JobId,
        kind: JobKind,
        max_retries: u32,
    ) -> Result<Vec<JobReport>, JobtrackError> {
        let mut reports = Vec::new();
        let mut current = job_id;
        let mut rounds = 0;

        loop {
            let mut report = self.watch(current, kind).await?;
            let next = match report.retry.take() {
                Some(request) if rounds < max_retries => Some(request),
                _ => None,
            };
            reports.push(report);

            let Some(request) = next else {
                return Ok(reports);
            };
            rounds += 1;
            current = self.coordinator.submit_retry(request).await?;
        }
    }

    /// Retry the technical failures of an already finished job.
    pub async fn retry(&self, job_id: &JobId, kind: JobKind) -> Result<JobId, JobtrackError> {
        let job = self.api.status(job_id, kind).await?;
        let request = self
            .coordinator
            .build_retry_request(&job)
            .ok_or_else(|| JobtrackError::NotRetryable(job_id.clone()))?;
        Ok(self.coordinator.submit_retry(request).await?)
    }

    pub async fn history(
        &self,
        kind: Option<JobKind>,
    ) -> Result<PaginatedList<JobSummary>, JobtrackError> {
        let jobs = self.api.list_jobs(kind).await?;
        let mut list = PaginatedList::new(self.page_size);
        list.replace_rows(jobs);
        Ok(list)
    }

    /// Save the job's CSV log to `out` (default `log_job_{id}.csv`).
    pub async fn download(
        &self,
        job_id: &JobId,
        out: Option<&Path>,
    ) -> Result<PathBuf, JobtrackError> {
        let bytes = self.api.download(job_id).await?;
        let path = match out {
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(format!("log_job_{job_id}.csv")),
        };
        tokio::fs::write(&path, &bytes).await?;
        tracing::info!(%job_id, path = %path.display(), bytes = bytes.len(), "Log downloaded");
        Ok(path)
    }
}

/// Parse `KEY=VALUE` search filters.
pub fn parse_filters(raw: &[String]) -> Result<Vec<(String, String)>, JobtrackError> {
    raw.iter()
        .map(|f| {
            let (key, value) = f
                .split_once('=')
                .ok_or_else(|| JobtrackError::InvalidFilter(f.clone()))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(JobtrackError::InvalidFilter(f.clone()));
            }
            Ok((key.to_string(), value.trim().to_string()))
        })
        .collect()
}
