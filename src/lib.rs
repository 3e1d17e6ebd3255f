//! jobtrack: acompanhamento de jobs de automação em lote.
//!
//! Um job é submetido sobre uma seleção de itens, consultado periodicamente
//! até concluir, e seus resultados são classificados em sucesso, isenção de
//! regra de negócio ou falha técnica. Só as falhas técnicas são reenviadas.

pub mod api;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod retry;
pub mod selection;
pub mod session;
pub mod tracker;
pub mod ui;

#[cfg(test)]
mod testing;

pub use api::{ApiError, HttpJobApi, JobApi};
pub use classifier::{Classification, ClassificationRules, ExemptionRule, ResultSummary};
pub use config::JobtrackConfig;
pub use error::JobtrackError;
pub use job::{ItemId, ItemResult, Job, JobId, JobKind, JobStatus, JobSummary, Outcome};
pub use orchestrator::{JobOrchestrator, JobReport};
pub use retry::{RetryCoordinator, RetryRequest, RetryStrategy};
pub use selection::{PaginatedList, SelectionSet};
pub use session::SessionContext;
pub use tracker::{JobTracker, Subscription, TrackerState, TrackerView};
