use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jobtrack::api::{HttpJobApi, JobApi};
use jobtrack::cli::{Cli, Command};
use jobtrack::orchestrator::{JobOrchestrator, JobReport, parse_filters};
use jobtrack::retry::RetryStrategy;
use jobtrack::session::{self, SessionContext};
use jobtrack::{ItemId, JobId, JobKind, JobtrackConfig, ui};

// Colunas exibidas na busca de candidatos, por tipo de job.
fn candidate_columns(kind: JobKind) -> &'static [&'static str] {
    match kind {
        JobKind::InvoiceEmail => &[
            "NM_PESSOA",
            "DT_VENCIMENTO",
            "VL_SALDO_TITULO",
            "DS_STATUS_TITULO",
        ],
        JobKind::Authorization => &[
            "NM_PACIENTE",
            "NR_ATENDIMENTO",
            "DS_CONVENIO",
            "DS_ESTAGIO",
        ],
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "jobtrack=debug"
    } else {
        "jobtrack=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = JobtrackConfig::load()?;
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }
    if let Some(ms) = cli.interval_ms {
        config.poll_interval_ms = ms;
    }

    let stored = (!config.token.is_empty()).then(|| SessionContext::from_token(&config.token));
    let api = HttpJobApi::with_timeout(&config.base_url, stored, config.request_timeout())
        .context("failed to build HTTP client")?;
    let api = Arc::new(api);

    let code = match cli.command {
        Command::Login { username, password } => {
            let ctx = session::login(api.http(), api.base_url(), &username, &password).await?;
            println!("Logged in as {} ({:?})", ctx.display_name(), ctx.role);
            println!("export JOBTRACK_TOKEN={}", ctx.token);
            ExitCode::SUCCESS
        }
        Command::Search {
            kind,
            filters,
            pick,
            all,
            page,
            submit,
            watch,
        } => {
            let kind = JobKind::from(kind);
            let orch = JobOrchestrator::new(Arc::clone(&api), &config);
            let filters = parse_filters(&filters)?;
            let mut list = orch.search(kind, &filters).await?;

            if all {
                list.toggle_all();
            }
            for id in pick {
                let id = ItemId::new(id);
                if list.toggle(&id).is_none() {
                    tracing::warn!(item_id = %id, "Picked item is not in the search results");
                }
            }
            list.set_page(page);
            ui::print_candidates(&list, candidate_columns(kind));

            if !submit {
                return Ok(ExitCode::SUCCESS);
            }
            let job_id = orch.submit_selection(kind, &list).await?;
            println!("Job {job_id} created with {} item(s)", list.selection().count());
            if watch {
                exit_code(&orch.watch(job_id, kind).await?)
            } else {
                ExitCode::SUCCESS
            }
        }
        Command::Submit { kind, ids, watch } => {
            let kind = JobKind::from(kind);
            let ids: Vec<ItemId> = ids.into_iter().map(ItemId::new).collect();
            let job_id = api.submit(kind, &ids).await?;
            println!("Job {job_id} created with {} item(s)", ids.len());
            if watch {
                let orch = JobOrchestrator::new(Arc::clone(&api), &config);
                exit_code(&orch.watch(job_id, kind).await?)
            } else {
                ExitCode::SUCCESS
            }
        }
        Command::Watch {
            job_id,
            kind,
            retry_failed,
        } => {
            let orch = JobOrchestrator::new(Arc::clone(&api), &config);
            let reports = orch
                .watch_with_retries(JobId::new(job_id), kind.into(), retry_failed)
                .await?;
            reports.last().map_or(ExitCode::SUCCESS, exit_code)
        }
        Command::Retry {
            job_id,
            kind,
            server,
            watch,
        } => {
            let kind = JobKind::from(kind);
            if server {
                config.retry_strategy = RetryStrategy::Server;
            }
            let orch = JobOrchestrator::new(Arc::clone(&api), &config);
            let new_id = orch.retry(&JobId::new(job_id.clone()), kind).await?;
            println!("Retry of job {job_id} created job {new_id}");
            if watch {
                exit_code(&orch.watch(new_id, kind).await?)
            } else {
                ExitCode::SUCCESS
            }
        }
        Command::Jobs { kind, page, json } => {
            let orch = JobOrchestrator::new(Arc::clone(&api), &config);
            let mut list = orch.history(kind.map(JobKind::from)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(list.rows())?);
            } else {
                list.set_page(page);
                ui::print_history(&list);
            }
            ExitCode::SUCCESS
        }
        Command::Stats { json } => {
            let stats = api.dashboard().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                ui::print_dashboard(&stats);
            }
            ExitCode::SUCCESS
        }
        Command::Download { job_id, out } => {
            let orch = JobOrchestrator::new(Arc::clone(&api), &config);
            let path = orch.download(&JobId::new(job_id), out.as_deref()).await?;
            println!("Saved {}", path.display());
            ExitCode::SUCCESS
        }
    };

    Ok(code)
}

// Falhas técnicas restantes viram código de saída 2, para uso em scripts.
fn exit_status(report: &JobReport) -> u8 {
    if report.summary.technical_failure_count > 0 {
        2
    } else {
        0
    }
}

fn exit_code(report: &JobReport) -> ExitCode {
    ExitCode::from(exit_status(report))
}
