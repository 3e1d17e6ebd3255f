use std::borrow::Cow;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::classifier::{Classification, ClassificationRules};

/// Accepts an identifier the backend may send either as a JSON string or as a
/// JSON integer.
#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrInteger {
    Text(String),
    Integer(i64),
}

impl TextOrInteger {
    fn into_string(self) -> String {
        match self {
            TextOrInteger::Text(s) => s,
            TextOrInteger::Integer(n) => n.to_string(),
        }
    }
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                Ok(Self(TextOrInteger::deserialize(deserializer)?.into_string()))
            }
        }
    };
}

opaque_id!(
    /// Server-issued identifier of a batch job.
    JobId
);

opaque_id!(
    /// Identifier of one item inside a batch (bill number, authorization sequence).
    ItemId
);

/// Lifecycle status of a job as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(rename = "PENDENTE", alias = "QUEUED")]
    Queued,
    #[serde(rename = "EM_ANDAMENTO", alias = "RUNNING")]
    Running,
    #[serde(rename = "CONCLUIDO", alias = "DONE")]
    Done,
}

impl JobStatus {
    /// `Done` is the only status a job never leaves.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => f.pad("QUEUED"),
            JobStatus::Running => f.pad("RUNNING"),
            JobStatus::Done => f.pad("DONE"),
        }
    }
}

/// Raw per-item outcome as reported by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "SUCESSO", alias = "SUCCESS")]
    Success,
    #[serde(rename = "FALHA", alias = "FAILURE")]
    Failure,
}

/// Which automation produced a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// Bill e-mail dispatch.
    #[serde(rename = "BOLETOS")]
    InvoiceEmail,
    /// Own-resource authorization processing.
    #[serde(rename = "RECURSO_PROPRIO")]
    Authorization,
}

impl JobKind {
    pub fn as_wire(self) -> &'static str {
        match self {
            JobKind::InvoiceEmail => "BOLETOS",
            JobKind::Authorization => "RECURSO_PROPRIO",
        }
    }

    /// Column carrying the item identifier in this kind's search rows.
    pub fn id_column(self) -> &'static str {
        match self {
            JobKind::InvoiceEmail => "NR_TITULO",
            JobKind::Authorization => "NR_SEQUENCIA",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_wire())
    }
}

/// Result of one item inside a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    #[serde(rename = "nr_titulo", alias = "itemId")]
    pub item_id: ItemId,
    #[serde(rename = "status", alias = "outcome")]
    pub outcome: Outcome,
    #[serde(
        rename = "detalhe",
        alias = "detail",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub detail: String,
    /// Structured failure reason, when the server provides one.
    #[serde(
        rename = "codigo",
        alias = "reasonCode",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reason_code: Option<String>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Authorization jobs pack their detail as a small JSON document.
#[derive(Debug, Deserialize)]
struct DetailEnvelope {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    paciente: Option<serde_json::Value>,
    #[serde(default)]
    atendimento: Option<serde_json::Value>,
}

/// Extra fields carried by an authorization result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemExtras {
    pub patient: Option<String>,
    pub encounter: Option<String>,
}

fn value_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

impl ItemResult {
    pub fn success(item_id: impl Into<ItemId>) -> Self {
        Self {
            item_id: item_id.into(),
            outcome: Outcome::Success,
            detail: String::new(),
            reason_code: None,
        }
    }

    pub fn failure(item_id: impl Into<ItemId>, detail: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            outcome: Outcome::Failure,
            detail: detail.into(),
            reason_code: None,
        }
    }

    fn envelope(&self) -> Option<DetailEnvelope> {
        if !self.detail.trim_start().starts_with('{') {
            return None;
        }
        serde_json::from_str(&self.detail).ok()
    }

    /// Human-readable detail, unwrapping the JSON envelope when present.
    pub fn message(&self) -> Cow<'_, str> {
        match self.envelope().and_then(|e| e.msg) {
            Some(msg) => Cow::Owned(msg),
            None => Cow::Borrowed(&self.detail),
        }
    }

    pub fn extras(&self) -> ItemExtras {
        match self.envelope() {
            Some(e) => ItemExtras {
                patient: e.paciente.and_then(value_text),
                encounter: e.atendimento.and_then(value_text),
            },
            None => ItemExtras::default(),
        }
    }

    /// Derived on every call; never stored alongside the result.
    pub fn classification(&self, rules: &ClassificationRules) -> Classification {
        rules.classify(self)
    }
}

/// Local view of a server-side job, replaced wholesale on every poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub total: u32,
    pub completed: u32,
    pub results: Vec<ItemResult>,
}

impl Job {
    pub fn is_done(&self) -> bool {
        self.status.is_terminal()
    }

    /// Completion percentage rounded half-up, 0 for an empty job.
    pub fn progress_percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let completed = u64::from(self.completed.min(self.total));
        let total = u64::from(self.total);
        ((completed * 200 + total) / (total * 2)) as u8
    }
}

/// One row of the job history listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: JobId,
    #[serde(rename = "automation_type", default)]
    pub kind: Option<JobKind>,
    pub status: JobStatus,
    #[serde(default)]
    pub total: u32,
    /// The history endpoint reports successes here, not processed items.
    #[serde(rename = "concluidos", default)]
    pub succeeded: u32,
    #[serde(default, with = "history_time")]
    pub start_time: Option<NaiveDateTime>,
    #[serde(default, with = "history_time")]
    pub end_time: Option<NaiveDateTime>,
    #[serde(rename = "stats_email", default)]
    pub business_exempt: u32,
    #[serde(rename = "stats_tecnico", default)]
    pub technical_failures: u32,
}

impl JobSummary {
    /// Legacy rows without a type were all bill e-mail jobs.
    pub fn kind(&self) -> JobKind {
        self.kind.unwrap_or(JobKind::InvoiceEmail)
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.end_time? - self.start_time?)
    }
}

mod history_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| NaiveDateTime::parse_from_str(&raw, FORMAT))
            .transpose()
            .map_err(serde::de::Error::custom)
    }

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => serializer.serialize_some(&t.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(total: u32, completed: u32) -> Job {
        Job {
            id: JobId::new("J1"),
            kind: JobKind::InvoiceEmail,
            status: JobStatus::Running,
            total,
            completed,
            results: Vec::new(),
        }
    }

    #[test]
    fn ids_accept_string_or_integer() {
        let a: JobId = serde_json::from_str(r#""42""#).unwrap();
        let b: JobId = serde_json::from_str("42").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "42");
    }

    #[test]
    fn status_accepts_backend_and_english_names() {
        let s: JobStatus = serde_json::from_str(r#""CONCLUIDO""#).unwrap();
        assert_eq!(s, JobStatus::Done);
        let s: JobStatus = serde_json::from_str(r#""RUNNING""#).unwrap();
        assert_eq!(s, JobStatus::Running);
        let s: JobStatus = serde_json::from_str(r#""QUEUED""#).unwrap();
        assert_eq!(s, JobStatus::Queued);
        assert!(JobStatus::Done.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn item_result_from_backend_row() {
        let json = r#"{"nr_titulo": 1001, "status": "FALHA", "detalhe": null}"#;
        let r: ItemResult = serde_json::from_str(json).unwrap();
        assert_eq!(r.item_id.as_str(), "1001");
        assert_eq!(r.outcome, Outcome::Failure);
        assert_eq!(r.detail, "");
        assert!(r.reason_code.is_none());
    }

    #[test]
    fn item_result_without_detail_field() {
        let json = r#"{"itemId": "1", "outcome": "SUCCESS"}"#;
        let r: ItemResult = serde_json::from_str(json).unwrap();
        assert_eq!(r.outcome, Outcome::Success);
        assert!(r.detail.is_empty());
    }

    #[test]
    fn message_unwraps_authorization_envelope() {
        let r = ItemResult::failure(
            "77",
            r#"{"msg": "Guia sem saldo", "paciente": "Maria", "atendimento": 5531}"#,
        );
        assert_eq!(r.message(), "Guia sem saldo");
        let extras = r.extras();
        assert_eq!(extras.patient.as_deref(), Some("Maria"));
        assert_eq!(extras.encounter.as_deref(), Some("5531"));
    }

    #[test]
    fn message_is_raw_text_otherwise() {
        let r = ItemResult::failure("1", "Erro timeout");
        assert_eq!(r.message(), "Erro timeout");
        assert_eq!(r.extras(), ItemExtras::default());

        let broken = ItemResult::failure("1", "{not json");
        assert_eq!(broken.message(), "{not json");
    }

    #[test]
    fn progress_percent_rounds() {
        assert_eq!(job(3, 1).progress_percent(), 33);
        assert_eq!(job(3, 2).progress_percent(), 67);
        assert_eq!(job(2, 1).progress_percent(), 50);
        assert_eq!(job(3, 3).progress_percent(), 100);
        assert_eq!(job(0, 0).progress_percent(), 0);
    }

    #[test]
    fn summary_parses_history_row() {
        let json = r#"{
            "job_id": 12,
            "automation_type": null,
            "status": "CONCLUIDO",
            "total": 10,
            "concluidos": 7,
            "start_time": "2025-03-10 08:00:00",
            "end_time": "2025-03-10 08:05:30",
            "stats_email": 2,
            "stats_tecnico": 1
        }"#;
        let s: JobSummary = serde_json::from_str(json).unwrap();
        assert_eq!(s.job_id.as_str(), "12");
        assert_eq!(s.kind(), JobKind::InvoiceEmail);
        assert_eq!(s.succeeded, 7);
        assert_eq!(s.business_exempt, 2);
        assert_eq!(s.technical_failures, 1);
        assert_eq!(s.duration().unwrap().num_seconds(), 330);
    }

    #[test]
    fn summary_of_running_job_has_no_duration() {
        let json = r#"{"job_id": "5", "automation_type": "RECURSO_PROPRIO",
            "status": "EM_ANDAMENTO", "start_time": "2025-03-10 08:00:00", "end_time": null}"#;
        let s: JobSummary = serde_json::from_str(json).unwrap();
        assert_eq!(s.kind(), JobKind::Authorization);
        assert!(s.duration().is_none());
    }
}
