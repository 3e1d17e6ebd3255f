use std::future::Future;
use std::sync::RwLock;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde_json::{Map, Value};

use super::error::ApiError;
use super::types::{
    AuthorizationItem, AuthorizationSubmission, CandidateItem, DashboardStats, ErrorBody,
    InvoiceSubmission, JobCreated, StatusResponse,
};
use crate::job::{ItemId, Job, JobId, JobKind, JobSummary};
use crate::session::SessionContext;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5098/api";

/// The remote job backend as seen by the tracker and the retry coordinator.
///
/// `HttpJobApi` is the production implementation; tests substitute scripted
/// doubles.
pub trait JobApi: Send + Sync {
    /// Fetch the current snapshot of a job.
    fn status(
        &self,
        job_id: &JobId,
        kind: JobKind,
    ) -> impl Future<Output = Result<Job, ApiError>> + Send;

    /// Create a job of `kind` over `item_ids`. Fails with
    /// [`ApiError::EmptySubmission`] without calling the server when the list
    /// is empty.
    fn submit(
        &self,
        kind: JobKind,
        item_ids: &[ItemId],
    ) -> impl Future<Output = Result<JobId, ApiError>> + Send;

    /// Create a job from rows of a search. Authorization rows carry patient
    /// and encounter along with the id; invoice rows submit only the id.
    fn submit_rows(
        &self,
        kind: JobKind,
        rows: &[&CandidateItem],
    ) -> impl Future<Output = Result<JobId, ApiError>> + Send;

    /// Ask the server to create a new job over the technical failures of a
    /// finished one. The server always creates an invoice job.
    fn retry(&self, job_id: &JobId) -> impl Future<Output = Result<JobId, ApiError>> + Send;

    /// CSV log of a job, as opaque bytes.
    fn download(&self, job_id: &JobId) -> impl Future<Output = Result<Vec<u8>, ApiError>> + Send;

    /// Job history, newest first, optionally filtered by kind.
    fn list_jobs(
        &self,
        kind: Option<JobKind>,
    ) -> impl Future<Output = Result<Vec<JobSummary>, ApiError>> + Send;

    /// Aggregated execution figures for the monitoring dashboard.
    fn dashboard(&self) -> impl Future<Output = Result<DashboardStats, ApiError>> + Send;

    /// Candidate items for a new submission.
    fn search(
        &self,
        kind: JobKind,
        filters: &[(String, String)],
    ) -> impl Future<Output = Result<Vec<CandidateItem>, ApiError>> + Send;
}

pub struct HttpJobApi {
    client: Client,
    base_url: String,
    session: RwLock<Option<SessionContext>>,
}

impl HttpJobApi {
    pub fn new(base_url: impl Into<String>, session: Option<SessionContext>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, session, Duration::from_secs(30))
    }

    /// The request timeout bounds each poll; the tracker adds none of its own.
    pub fn with_timeout(
        base_url: impl Into<String>,
        session: Option<SessionContext>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: RwLock::new(session),
        })
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> Option<SessionContext> {
        self.session
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Swap in a refreshed session; polls still running pick it up on their
    /// next request.
    pub fn replace_session(&self, session: SessionContext) {
        *self
            .session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(session);
    }

    pub fn clear_session(&self) {
        *self
            .session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    async fn create(
        &self,
        builder: RequestBuilder,
        kind: JobKind,
        items: usize,
    ) -> Result<JobId, ApiError> {
        let created = self.send(builder).await?.json::<JobCreated>().await?;
        tracing::info!(job_id = %created.job_id, %kind, items, "Job submitted");
        Ok(created.job_id)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.session() {
            Some(session) => builder.bearer_auth(session.token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = self.authorized(builder).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        let message = ErrorBody::message_of(&body);
        tracing::debug!(status = status.as_u16(), %message, "Request failed");
        Err(ApiError::from_status(status.as_u16(), message))
    }
}

impl JobApi for HttpJobApi {
    async fn status(&self, job_id: &JobId, kind: JobKind) -> Result<Job, ApiError> {
        let url = self.url(&format!("status-automacao/{job_id}"));
        let response = self.send(self.client.get(&url)).await?;
        let body = response.json::<StatusResponse>().await?;
        Ok(body.into_job(job_id.clone(), kind))
    }

    async fn submit(&self, kind: JobKind, item_ids: &[ItemId]) -> Result<JobId, ApiError> {
        if item_ids.is_empty() {
            return Err(ApiError::EmptySubmission);
        }

        let builder = match kind {
            JobKind::InvoiceEmail => self
                .client
                .post(self.url("executar-automacao"))
                .json(&InvoiceSubmission {
                    titulos: item_ids.to_vec(),
                }),
            JobKind::Authorization => self
                .client
                .post(self.url("recurso-proprio/executar"))
                .json(&AuthorizationSubmission {
                    itens: item_ids.iter().map(AuthorizationItem::from_id).collect(),
                }),
        };
        self.create(builder, kind, item_ids.len()).await
    }

    async fn submit_rows(&self, kind: JobKind, rows: &[&CandidateItem]) -> Result<JobId, ApiError> {
        if kind == JobKind::InvoiceEmail {
            let ids: Vec<ItemId> = rows.iter().map(|r| r.id.clone()).collect();
            return self.submit(kind, &ids).await;
        }
        if rows.is_empty() {
            return Err(ApiError::EmptySubmission);
        }

        let body = AuthorizationSubmission {
            itens: rows
                .iter()
                .map(|r| AuthorizationItem::from_candidate(r))
                .collect(),
        };
        let builder = self
            .client
            .post(self.url("recurso-proprio/executar"))
            .json(&body);
        self.create(builder, kind, rows.len()).await
    }

    async fn retry(&self, job_id: &JobId) -> Result<JobId, ApiError> {
        let url = self.url(&format!("jobs/{job_id}/retry"));
        let created = self.send(self.client.post(&url)).await?.json::<JobCreated>().await?;
        tracing::info!(source = %job_id, job_id = %created.job_id, "Retry job created by server");
        Ok(created.job_id)
    }

    async fn download(&self, job_id: &JobId) -> Result<Vec<u8>, ApiError> {
        let url = self.url(&format!("jobs/{job_id}/download"));
        let bytes = self.send(self.client.get(&url)).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn list_jobs(&self, kind: Option<JobKind>) -> Result<Vec<JobSummary>, ApiError> {
        let mut builder = self.client.get(self.url("jobs"));
        if let Some(kind) = kind {
            builder = builder.query(&[("type", kind.as_wire())]);
        }
        Ok(self.send(builder).await?.json::<Vec<JobSummary>>().await?)
    }

    async fn dashboard(&self) -> Result<DashboardStats, ApiError> {
        let response = self.send(self.client.get(self.url("dashboard"))).await?;
        Ok(response.json::<DashboardStats>().await?)
    }

    async fn search(
        &self,
        kind: JobKind,
        filters: &[(String, String)],
    ) -> Result<Vec<CandidateItem>, ApiError> {
        let path = match kind {
            JobKind::InvoiceEmail => "titulos",
            JobKind::Authorization => "recurso-proprio/listar",
        };
        let query: Vec<&(String, String)> = filters.iter().filter(|(_, v)| !v.is_empty()).collect();
        let rows = self
            .send(self.client.get(self.url(path)).query(&query))
            .await?
            .json::<Vec<Map<String, Value>>>()
            .await?;

        let total = rows.len();
        let items: Vec<CandidateItem> = rows
            .into_iter()
            .filter_map(|row| CandidateItem::from_row(kind, row))
            .collect();
        if items.len() < total {
            tracing::warn!(
                %kind,
                dropped = total - items.len(),
                column = kind.id_column(),
                "Search rows without an id column were skipped"
            );
        }
        Ok(items)
    }
}
