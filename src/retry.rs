//! Reenvio das falhas técnicas de um job concluído.
//!
//! O [`RetryCoordinator`] deriva, de um job `Done`, o subconjunto de itens
//! classificados como falha técnica e cria um novo job só com eles. O novo
//! job é uma entidade nova: quem chama deve rastreá-lo com um
//! [`JobTracker`](crate::tracker::JobTracker) novo.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::{ApiError, JobApi};
use crate::classifier::ClassificationRules;
use crate::job::{ItemId, Job, JobId, JobKind};

/// Como o reenvio é submetido ao servidor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Nova submissão do mesmo tipo com os ids filtrados no cliente.
    #[default]
    Resubmit,
    /// `POST /jobs/{id}/retry`: o servidor filtra as falhas por conta própria.
    /// Só vale para boletos; os demais tipos caem em `Resubmit`.
    Server,
}

/// Itens de um job concluído a reenviar. Consumido por valor em
/// [`RetryCoordinator::submit_retry`].
#[derive(Debug, PartialEq, Eq)]
pub struct RetryRequest {
    source_job: JobId,
    kind: JobKind,
    item_ids: Vec<ItemId>,
}

impl RetryRequest {
    pub fn source_job(&self) -> &JobId {
        &self.source_job
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn item_ids(&self) -> &[ItemId] {
        &self.item_ids
    }
}

pub struct RetryCoordinator<A> {
    api: Arc<A>,
    rules: ClassificationRules,
    strategy: RetryStrategy,
}

impl<A: JobApi> RetryCoordinator<A> {
    pub fn new(api: Arc<A>, rules: ClassificationRules, strategy: RetryStrategy) -> Self {
        Self {
            api,
            rules,
            strategy,
        }
    }

    pub fn rules(&self) -> &ClassificationRules {
        &self.rules
    }

    /// `Some` iff the job is done and has at least one technical failure.
    pub fn build_retry_request(&self, job: &Job) -> Option<RetryRequest> {
        if !job.is_done() {
            return None;
        }
        let item_ids: Vec<ItemId> = self
            .rules
            .technical_failures(job)
            .map(|r| r.item_id.clone())
            .collect();
        if item_ids.is_empty() {
            return None;
        }
        Some(RetryRequest {
            source_job: job.id.clone(),
            kind: job.kind,
            item_ids,
        })
    }

    /// Issue exactly one submission for `request` and return the new job id.
    /// On failure nothing else changes; the caller keeps showing the source job.
    pub async fn submit_retry(&self, request: RetryRequest) -> Result<JobId, ApiError> {
        let result = match self.strategy {
            RetryStrategy::Server if request.kind == JobKind::InvoiceEmail => {
                self.api.retry(&request.source_job).await
            }
            RetryStrategy::Server => {
                // O reenvio do servidor sempre cria um job de boletos.
                tracing::warn!(
                    source = %request.source_job,
                    kind = %request.kind,
                    "Server retry only handles invoice jobs; resubmitting instead"
                );
                self.api.submit(request.kind, &request.item_ids).await
            }
            RetryStrategy::Resubmit => self.api.submit(request.kind, &request.item_ids).await,
        };

        match &result {
            Ok(job_id) => tracing::info!(
                source = %request.source_job,
                %job_id,
                items = request.item_ids.len(),
                strategy = ?self.strategy,
                "Retry job created"
            ),
            Err(e) => tracing::warn!(
                source = %request.source_job,
                error = %e,
                "Retry submission failed"
            ),
        }
        result
    }
}
