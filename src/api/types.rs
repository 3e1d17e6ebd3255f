//! Tipos de dados para requisições e respostas da API de automação.
//!
//! As structs espelham o JSON trocado com o backend. Os nomes de campo do
//! backend (em português) são os nomes serializados; os nomes em inglês são
//! aceitos como `alias` na leitura.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::job::{ItemId, ItemResult, Job, JobId, JobKind, JobStatus};

/// Corpo de `GET /status-automacao/{id}`.
///
/// Não traz o id nem o tipo do job; [`StatusResponse::into_job`] os carimba
/// a partir do job rastreado.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: JobStatus,
    #[serde(default)]
    pub total: u32,
    #[serde(rename = "concluidos", alias = "completed", default)]
    pub completed: u32,
    #[serde(rename = "resultados", alias = "results", default)]
    pub results: Vec<ItemResult>,
}

impl StatusResponse {
    pub fn into_job(self, id: JobId, kind: JobKind) -> Job {
        Job {
            id,
            kind,
            status: self.status,
            total: self.total,
            completed: self.completed,
            results: self.results,
        }
    }
}

/// Resposta das rotas que criam jobs (submissão e reenvio).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCreated {
    #[serde(alias = "jobId")]
    pub job_id: JobId,
    #[serde(default)]
    pub message: Option<String>,
}

/// Corpo de `POST /executar-automacao`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceSubmission {
    pub titulos: Vec<ItemId>,
}

/// Uma linha enviada em `POST /recurso-proprio/executar`.
///
/// O worker lê `nr_sequencia` e copia paciente e atendimento para o
/// resultado do item; os dois são opcionais.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationItem {
    #[serde(rename = "nr_sequencia")]
    pub sequence: ItemId,
    #[serde(rename = "nm_paciente", default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<Value>,
    #[serde(rename = "nr_atendimento", default, skip_serializing_if = "Option::is_none")]
    pub encounter: Option<Value>,
}

impl AuthorizationItem {
    /// Só o id; usado no reenvio, quando a linha da busca já não existe.
    pub fn from_id(id: &ItemId) -> Self {
        Self {
            sequence: id.clone(),
            patient: None,
            encounter: None,
        }
    }

    /// Id mais `NM_PACIENTE` e `NR_ATENDIMENTO` da linha da busca.
    pub fn from_candidate(item: &CandidateItem) -> Self {
        let column = |name: &str| item.row.get(name).filter(|v| !v.is_null()).cloned();
        Self {
            sequence: item.id.clone(),
            patient: column("NM_PACIENTE"),
            encounter: column("NR_ATENDIMENTO"),
        }
    }
}

/// Corpo de `POST /recurso-proprio/executar`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationSubmission {
    pub itens: Vec<AuthorizationItem>,
}

/// Corpo de erro do backend: `{"error": ...}` ou `{"msg": ...}`.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
}

impl ErrorBody {
    /// Extrai a mensagem de um corpo de erro, caindo para o texto cru.
    pub fn message_of(raw: &str) -> String {
        serde_json::from_str::<ErrorBody>(raw)
            .ok()
            .and_then(|b| b.error.or(b.msg))
            .unwrap_or_else(|| raw.trim().to_string())
    }
}

/// Corpo de `GET /dashboard`.
///
/// `detalhes` só traz os tipos que já rodaram alguma vez; use
/// [`DashboardStats::kind`], que devolve zeros para os ausentes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    #[serde(rename = "geral_jobs", default)]
    pub total_jobs: u64,
    #[serde(rename = "detalhes", default)]
    pub by_kind: BTreeMap<String, KindStats>,
    #[serde(rename = "grafico_7_dias", default)]
    pub last_7_days: Vec<DailyJobs>,
}

impl DashboardStats {
    pub fn kind(&self, kind: JobKind) -> KindStats {
        self.by_kind
            .get(kind.as_wire())
            .cloned()
            .unwrap_or_default()
    }
}

/// Totais de um tipo de automação.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindStats {
    #[serde(rename = "execucoes", default)]
    pub executions: u64,
    #[serde(rename = "processados", default)]
    pub processed: u64,
    #[serde(rename = "sucessos", default)]
    pub succeeded: u64,
    /// Percentual já arredondado pelo servidor (uma casa).
    #[serde(rename = "taxa_sucesso", default)]
    pub success_rate: f64,
}

/// Jobs iniciados num dia, por tipo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyJobs {
    /// `dd/mm`.
    #[serde(rename = "dia")]
    pub day: String,
    #[serde(rename = "boletos", default)]
    pub invoice_jobs: u64,
    #[serde(rename = "recurso", default)]
    pub authorization_jobs: u64,
}

impl DailyJobs {
    pub fn total(&self) -> u64 {
        self.invoice_jobs + self.authorization_jobs
    }
}

/// Uma linha retornada pelas buscas de títulos ou autorizações.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateItem {
    pub id: ItemId,
    pub row: Map<String, Value>,
}

impl CandidateItem {
    /// Monta o candidato lendo o id da coluna própria do tipo de job.
    /// Linhas sem essa coluna são descartadas.
    pub fn from_row(kind: JobKind, row: Map<String, Value>) -> Option<Self> {
        let id = match row.get(kind.id_column())? {
            Value::String(s) => ItemId::new(s.clone()),
            Value::Number(n) => ItemId::new(n.to_string()),
            _ => return None,
        };
        Some(Self { id, row })
    }

    /// Valor textual de uma coluna, para exibição.
    pub fn field(&self, column: &str) -> Option<String> {
        match self.row.get(column)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}
