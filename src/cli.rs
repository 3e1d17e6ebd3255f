//! Interface de linha de comando do jobtrack baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (login, search, submit,
//! watch, retry, jobs, stats, download) e flags globais (--base-url, --interval-ms,
//! --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::job::JobKind;

/// jobtrack: acompanha jobs de automação em lote, classifica falhas e reenvia.
#[derive(Debug, Parser)]
#[command(name = "jobtrack", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// URL base da API (sobrescreve `jobtrack.toml` e `JOBTRACK_URL`).
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Intervalo entre consultas de status, em milissegundos.
    #[arg(long, global = true)]
    pub interval_ms: Option<u64>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Tipo de job aceito pela CLI, mapeado para [`JobKind`] internamente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Envio de boletos por e-mail.
    Invoices,
    /// Autorizações de recurso próprio.
    Authorizations,
}

impl From<KindArg> for JobKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Invoices => JobKind::InvoiceEmail,
            KindArg::Authorizations => JobKind::Authorization,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Autentica no backend e imprime o token da sessão.
    Login {
        #[arg(long)]
        username: String,

        /// Senha; se omitida, lida de `JOBTRACK_PASSWORD`.
        #[arg(long, env = "JOBTRACK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Busca itens candidatos, seleciona e opcionalmente submete.
    Search {
        #[arg(long, value_enum, default_value_t = KindArg::Invoices)]
        kind: KindArg,

        /// Filtro `CHAVE=VALOR`; pode ser repetido.
        #[arg(long = "filter", short = 'f')]
        filters: Vec<String>,

        /// Seleciona um item pelo id; pode ser repetido.
        #[arg(long)]
        pick: Vec<String>,

        /// Seleciona todos os itens encontrados.
        #[arg(long, default_value_t = false)]
        all: bool,

        /// Página a exibir (começa em 1).
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Submete a seleção como um novo job.
        #[arg(long, default_value_t = false)]
        submit: bool,

        /// Acompanha o job submetido até o fim.
        #[arg(long, default_value_t = false, requires = "submit")]
        watch: bool,
    },

    /// Submete itens já conhecidos como um novo job.
    Submit {
        #[arg(long, value_enum, default_value_t = KindArg::Invoices)]
        kind: KindArg,

        /// Ids dos itens.
        #[arg(required = true)]
        ids: Vec<String>,

        #[arg(long, default_value_t = false)]
        watch: bool,
    },

    /// Acompanha um job em andamento.
    Watch {
        job_id: String,

        #[arg(long, value_enum, default_value_t = KindArg::Invoices)]
        kind: KindArg,

        /// Reenvia automaticamente as falhas técnicas, no máximo N vezes.
        #[arg(long, value_name = "N", default_value_t = 0)]
        retry_failed: u32,
    },

    /// Reenvia as falhas técnicas de um job concluído.
    Retry {
        job_id: String,

        #[arg(long, value_enum, default_value_t = KindArg::Invoices)]
        kind: KindArg,

        /// Usa o endpoint de reenvio do servidor em vez de nova submissão.
        #[arg(long, default_value_t = false)]
        server: bool,

        #[arg(long, default_value_t = false)]
        watch: bool,
    },

    /// Lista o histórico de jobs.
    Jobs {
        #[arg(long, value_enum)]
        kind: Option<KindArg>,

        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Imprime o histórico como JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Mostra o painel de execuções: totais por tipo e os últimos 7 dias.
    Stats {
        /// Imprime os números como JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Baixa o log CSV de um job.
    Download {
        job_id: String,

        /// Arquivo de saída (padrão `log_job_{id}.csv`).
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
}
