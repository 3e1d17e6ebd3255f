//! Triagem dos resultados por item.
//!
//! Cada [`ItemResult`] é classificado como sucesso, falha de regra de negócio
//! (isenta, nada a reenviar) ou falha técnica (elegível a reenvio). A tabela
//! de isenções é configurável e indexada por um código de motivo estável; o
//! casamento por trecho da mensagem só é usado quando o servidor não envia
//! o código.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::job::{ItemResult, Job, Outcome};

/// Derived category of an item result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Success,
    /// Failed because precondition data is missing; not actionable.
    BusinessExempt,
    /// Failed because of a system fault; worth retrying.
    TechnicalFailure,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Success => write!(f, "Success"),
            Classification::BusinessExempt => write!(f, "Business-exempt"),
            Classification::TechnicalFailure => write!(f, "Technical failure"),
        }
    }
}

/// Uma regra de isenção: código de motivo e o trecho de mensagem equivalente.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExemptionRule {
    /// Código estável enviado pelo servidor (campo `codigo`).
    pub code: String,
    /// Trecho procurado na mensagem quando o código não vem na resposta.
    pub pattern: String,
}

impl ExemptionRule {
    pub fn new(code: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            pattern: pattern.into(),
        }
    }

    fn matches(&self, result: &ItemResult) -> bool {
        match &result.reason_code {
            Some(code) => code == &self.code,
            None => !self.pattern.is_empty() && result.message().contains(self.pattern.as_str()),
        }
    }
}

/// Tabela de isenções usada pela classificação.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationRules {
    rules: Vec<ExemptionRule>,
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self {
            rules: vec![ExemptionRule::new("sem_email", "E-mail não preenchido")],
        }
    }
}

impl ClassificationRules {
    pub fn new(rules: Vec<ExemptionRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ExemptionRule] {
        &self.rules
    }

    /// Pure function of the result's outcome, detail and reason code.
    pub fn classify(&self, result: &ItemResult) -> Classification {
        match result.outcome {
            Outcome::Success => Classification::Success,
            Outcome::Failure if self.rules.iter().any(|r| r.matches(result)) => {
                Classification::BusinessExempt
            }
            Outcome::Failure => Classification::TechnicalFailure,
        }
    }

    /// Results of `job` classified as technical failures, in result order.
    pub fn technical_failures<'a>(
        &'a self,
        job: &'a Job,
    ) -> impl Iterator<Item = &'a ItemResult> + 'a {
        job.results
            .iter()
            .filter(move |r| self.classify(r) == Classification::TechnicalFailure)
    }
}

/// Aggregate counters over one snapshot's results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub success_count: usize,
    pub business_exempt_count: usize,
    pub technical_failure_count: usize,
}

impl ResultSummary {
    /// Recomputed from scratch; result lists are bounded by one submission.
    pub fn of(job: &Job, rules: &ClassificationRules) -> Self {
        job.results
            .iter()
            .fold(Self::default(), |mut acc, r| {
                match rules.classify(r) {
                    Classification::Success => acc.success_count += 1,
                    Classification::BusinessExempt => acc.business_exempt_count += 1,
                    Classification::TechnicalFailure => acc.technical_failure_count += 1,
                }
                acc
            })
    }

    pub fn failure_count(&self) -> usize {
        self.business_exempt_count + self.technical_failure_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobId, JobKind, JobStatus};

    fn job_with(results: Vec<ItemResult>) -> Job {
        Job {
            id: JobId::new("J1"),
            kind: JobKind::InvoiceEmail,
            status: JobStatus::Done,
            total: results.len() as u32,
            completed: results.len() as u32,
            results,
        }
    }

    #[test]
    fn success_ignores_detail_text() {
        let rules = ClassificationRules::default();
        let mut r = ItemResult::success("1");
        r.detail = "E-mail não preenchido".into();
        assert_eq!(rules.classify(&r), Classification::Success);
        r.reason_code = Some("sem_email".into());
        assert_eq!(rules.classify(&r), Classification::Success);
    }

    #[test]
    fn missing_email_is_business_exempt() {
        let rules = ClassificationRules::default();
        let r = ItemResult::failure("3", "E-mail não preenchido");
        assert_eq!(rules.classify(&r), Classification::BusinessExempt);
    }

    #[test]
    fn other_failures_are_technical() {
        let rules = ClassificationRules::default();
        let r = ItemResult::failure("2", "Erro timeout");
        assert_eq!(rules.classify(&r), Classification::TechnicalFailure);
        let empty = ItemResult::failure("4", "");
        assert_eq!(rules.classify(&empty), Classification::TechnicalFailure);
    }

    #[test]
    fn reason_code_takes_precedence_over_text() {
        let rules = ClassificationRules::default();
        let mut r = ItemResult::failure("5", "E-mail não preenchido");
        r.reason_code = Some("timeout".into());
        assert_eq!(rules.classify(&r), Classification::TechnicalFailure);

        let mut coded = ItemResult::failure("6", "whatever the worker said");
        coded.reason_code = Some("sem_email".into());
        assert_eq!(rules.classify(&coded), Classification::BusinessExempt);
    }

    #[test]
    fn pattern_matches_inside_authorization_envelope() {
        let rules = ClassificationRules::new(vec![ExemptionRule::new(
            "sem_guia",
            "Guia não localizada",
        )]);
        let r = ItemResult::failure("9", r#"{"msg": "Guia não localizada", "paciente": "Ana"}"#);
        assert_eq!(rules.classify(&r), Classification::BusinessExempt);
    }

    #[test]
    fn empty_pattern_never_matches() {
        let rules = ClassificationRules::new(vec![ExemptionRule::new("x", "")]);
        let r = ItemResult::failure("1", "anything");
        assert_eq!(rules.classify(&r), Classification::TechnicalFailure);
    }

    #[test]
    fn classification_is_idempotent() {
        let rules = ClassificationRules::default();
        for r in [
            ItemResult::success("1"),
            ItemResult::failure("2", "Erro timeout"),
            ItemResult::failure("3", "E-mail não preenchido"),
        ] {
            assert_eq!(r.classification(&rules), r.classification(&rules));
        }
    }

    #[test]
    fn summary_counts_each_class() {
        let rules = ClassificationRules::default();
        let job = job_with(vec![
            ItemResult::success("1"),
            ItemResult::failure("2", "Erro timeout"),
            ItemResult::failure("3", "E-mail não preenchido"),
            ItemResult::success("4"),
        ]);
        let s = ResultSummary::of(&job, &rules);
        assert_eq!(s.success_count, 2);
        assert_eq!(s.technical_failure_count, 1);
        assert_eq!(s.business_exempt_count, 1);
        assert_eq!(s.failure_count(), 2);

        let ids: Vec<_> = rules
            .technical_failures(&job)
            .map(|r| r.item_id.as_str())
            .collect();
        assert_eq!(ids, vec!["2"]);
    }

    #[test]
    fn rules_load_from_toml_table() {
        #[derive(Deserialize)]
        struct Wrapper {
            exemption_rules: ClassificationRules,
        }
        let w: Wrapper = toml::from_str(
            r#"
            [[exemption_rules]]
            code = "sem_email"
            pattern = "E-mail não preenchido"

            [[exemption_rules]]
            code = "cpf_invalido"
            pattern = "CPF inválido"
            "#,
        )
        .unwrap();
        assert_eq!(w.exemption_rules.rules().len(), 2);
        assert_eq!(w.exemption_rules.rules()[1].code, "cpf_invalido");
    }
}
