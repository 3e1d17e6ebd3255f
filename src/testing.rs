//! Scripted [`JobApi`] double shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::api::{ApiError, CandidateItem, DashboardStats, JobApi};
use crate::job::{ItemId, ItemResult, Job, JobId, JobKind, JobStatus, JobSummary};

pub enum Step {
    Snapshot(Job),
    Delayed(Duration, Job),
    Unauthorized,
    Fail(u16),
}

#[derive(Default)]
pub struct ScriptedApi {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Job>>,
    status_calls: AtomicUsize,
    created: Mutex<VecDeque<Result<JobId, u16>>>,
    pub submissions: Mutex<Vec<(JobKind, Vec<ItemId>)>>,
    pub server_retries: Mutex<Vec<JobId>>,
}

impl ScriptedApi {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            ..Default::default()
        }
    }

    /// Queue the reply to the next submit/retry call.
    pub fn then_create(self, reply: Result<&str, u16>) -> Self {
        self.created
            .lock()
            .unwrap()
            .push_back(reply.map(JobId::from));
        self
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn next_created(&self) -> Result<JobId, ApiError> {
        match self.created.lock().unwrap().pop_front() {
            Some(Ok(id)) => Ok(id),
            Some(Err(status)) => Err(ApiError::from_status(status, "scripted".into())),
            None => Err(ApiError::from_status(500, "no scripted reply".into())),
        }
    }
}

pub fn job(id: &str, status: JobStatus, total: u32, results: Vec<ItemResult>) -> Job {
    Job {
        id: JobId::new(id),
        kind: JobKind::InvoiceEmail,
        status,
        total,
        completed: results.len() as u32,
        results,
    }
}

impl JobApi for ScriptedApi {
    async fn status(&self, job_id: &JobId, kind: JobKind) -> Result<Job, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();
        let fetched = match step {
            Some(Step::Snapshot(job)) => job,
            Some(Step::Delayed(delay, job)) => {
                tokio::time::sleep(delay).await;
                job
            }
            Some(Step::Unauthorized) => return Err(ApiError::Unauthorized),
            Some(Step::Fail(status)) => {
                return Err(ApiError::from_status(status, "scripted".into()));
            }
            None => match self.last.lock().unwrap().clone() {
                Some(job) => job,
                None => return Err(ApiError::from_status(500, "script exhausted".into())),
            },
        };
        *self.last.lock().unwrap() = Some(fetched.clone());
        Ok(Job {
            id: job_id.clone(),
            kind,
            ..fetched
        })
    }

    async fn submit(&self, kind: JobKind, item_ids: &[ItemId]) -> Result<JobId, ApiError> {
        if item_ids.is_empty() {
            return Err(ApiError::EmptySubmission);
        }
        self.submissions
            .lock()
            .unwrap()
            .push((kind, item_ids.to_vec()));
        self.next_created()
    }

    async fn submit_rows(&self, kind: JobKind, rows: &[&CandidateItem]) -> Result<JobId, ApiError> {
        let ids: Vec<ItemId> = rows.iter().map(|r| r.id.clone()).collect();
        self.submit(kind, &ids).await
    }

    async fn retry(&self, job_id: &JobId) -> Result<JobId, ApiError> {
        self.server_retries.lock().unwrap().push(job_id.clone());
        self.next_created()
    }

    async fn download(&self, _job_id: &JobId) -> Result<Vec<u8>, ApiError> {
        Ok(b"Nr Titulo;Status;Detalhe;Data\n".to_vec())
    }

    async fn list_jobs(&self, _kind: Option<JobKind>) -> Result<Vec<JobSummary>, ApiError> {
        Ok(Vec::new())
    }

    async fn dashboard(&self) -> Result<DashboardStats, ApiError> {
        Ok(DashboardStats::default())
    }

    async fn search(
        &self,
        _kind: JobKind,
        _filters: &[(String, String)],
    ) -> Result<Vec<CandidateItem>, ApiError> {
        Ok(Vec::new())
    }
}
