//! Configuração do jobtrack carregada a partir de `jobtrack.toml`.
//!
//! A struct [`JobtrackConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `JOBTRACK_URL` e `JOBTRACK_TOKEN` têm precedência
//! sobre o arquivo.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::api::DEFAULT_BASE_URL;
use crate::classifier::ClassificationRules;
use crate::retry::RetryStrategy;

pub const CONFIG_FILE: &str = "jobtrack.toml";

/// Configuração de nível superior carregada de `jobtrack.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobtrackConfig {
    /// URL base da API de automação (ex.: `http://host:5098/api`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Token de acesso de uma sessão já autenticada.
    #[serde(default)]
    pub token: String,

    /// Intervalo entre consultas de status, em milissegundos.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Timeout de cada requisição HTTP, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Linhas por página nas listagens.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Como reenviar as falhas técnicas.
    #[serde(default)]
    pub retry_strategy: RetryStrategy,

    /// Tabela de falhas de regra de negócio (não reenviáveis).
    #[serde(default)]
    pub exemption_rules: ClassificationRules,
}

// Valor padrão para a URL base: backend local.
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

// Valor padrão para o intervalo de consulta: 2000ms.
fn default_poll_interval_ms() -> u64 {
    2000
}

// Valor padrão para o timeout de requisição: 30s.
fn default_request_timeout_secs() -> u64 {
    30
}

// Valor padrão para o tamanho de página: 10.
fn default_page_size() -> usize {
    10
}

impl Default for JobtrackConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: String::new(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            page_size: default_page_size(),
            retry_strategy: RetryStrategy::default(),
            exemption_rules: ClassificationRules::default(),
        }
    }
}

impl JobtrackConfig {
    /// Carrega a configuração de `jobtrack.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega a configuração de um caminho explícito e aplica o ambiente.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<JobtrackConfig>(&contents)
                .with_context(|| format!("invalid config in {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    // Variáveis de ambiente têm precedência sobre o arquivo de configuração.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("JOBTRACK_URL")
            && !url.is_empty()
        {
            self.base_url = url;
        }
        if let Some(token) = var("JOBTRACK_TOKEN")
            && !token.is_empty()
        {
            self.token = token;
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
