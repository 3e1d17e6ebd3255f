//! Interface de terminal do jobtrack: barra de progresso e saída colorida.
//!
//! Usa as crates `indicatif` para a barra de progresso e `console` para
//! estilização com cores. O [`JobProgress`] acompanha visualmente um job
//! rastreado no terminal; as demais funções imprimem tabelas de resultados,
//! histórico, painel de execuções e candidatos à seleção.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::api::{CandidateItem, DashboardStats};
use crate::classifier::{Classification, ClassificationRules, ResultSummary};
use crate::job::{Job, JobKind, JobSummary};
use crate::selection::PaginatedList;
use crate::tracker::{TrackerState, TrackerView};

/// Estilos compartilhados: verde para sucesso, amarelo para isenção de regra
/// de negócio, vermelho para falha técnica.
struct Palette {
    green: Style,
    yellow: Style,
    red: Style,
    dim: Style,
}

impl Palette {
    fn new() -> Self {
        Self {
            green: Style::new().green().bold(),
            yellow: Style::new().yellow(),
            red: Style::new().red().bold(),
            dim: Style::new().dim(),
        }
    }

    fn for_class(&self, class: Classification) -> (&Style, &'static str) {
        match class {
            Classification::Success => (&self.green, "✓"),
            Classification::BusinessExempt => (&self.yellow, "⚠"),
            Classification::TechnicalFailure => (&self.red, "✗"),
        }
    }
}

/// Indicador visual de progresso de um job rastreado.
pub struct JobProgress {
    // Barra de progresso do indicatif.
    pb: ProgressBar,
    palette: Palette,
}

impl JobProgress {
    /// Cria a barra para o job e exibe a espera pelo primeiro snapshot.
    pub fn start(view: &TrackerView) -> Self {
        let pb = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=> "));
        }
        pb.set_message(format!("Job {}: connecting to worker...", view.job_id));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            palette: Palette::new(),
        }
    }

    /// Atualiza a barra com o snapshot mais recente.
    ///
    /// Uma falha de autenticação mantém o último progresso e só acrescenta
    /// um aviso.
    pub fn update(&self, view: &TrackerView) {
        let mut msg = match &view.latest {
            Some(job) => {
                self.pb.set_length(u64::from(job.total));
                self.pb.set_position(u64::from(job.completed.min(job.total)));
                format!("{}% {}", job.progress_percent(), job.status)
            }
            None => format!("Job {}: connecting to worker...", view.job_id),
        };
        if view.awaiting_session {
            msg.push_str(" (session expired, waiting for a new login)");
        }
        self.pb.set_message(msg);
    }

    /// Finaliza a barra e exibe o estado final do rastreamento.
    pub fn finish(&self, view: &TrackerView) {
        self.pb.finish_and_clear();
        match view.state {
            TrackerState::Done => {
                println!(
                    "  {} Job {} finished",
                    self.palette.green.apply_to("✓"),
                    view.job_id
                );
            }
            TrackerState::Errored => {
                println!(
                    "  {} Could not load the status of job {}: {}",
                    self.palette.red.apply_to("✗"),
                    view.job_id,
                    view.error.as_deref().unwrap_or("unknown error")
                );
            }
            TrackerState::Idle | TrackerState::Polling => {
                println!(
                    "  {} Stopped tracking job {}",
                    self.palette.yellow.apply_to("↻"),
                    view.job_id
                );
            }
        }
    }
}

/// Imprime o log de execução do job, item a item, com a classificação.
pub fn print_results(job: &Job, rules: &ClassificationRules) {
    let palette = Palette::new();
    println!();
    println!("{}", palette.dim.apply_to("─── Execution log ───"));
    for result in &job.results {
        let (style, mark) = palette.for_class(result.classification(rules));
        let mut line = format!("  {} {:<12} {}", style.apply_to(mark), result.item_id, result.message());
        if job.kind == JobKind::Authorization {
            let extras = result.extras();
            if let Some(patient) = extras.patient {
                line.push_str(&format!("  [{patient}"));
                if let Some(encounter) = extras.encounter {
                    line.push_str(&format!(" / {encounter}"));
                }
                line.push(']');
            }
        }
        println!("{line}");
    }
}

/// Imprime os contadores e, quando houver, a oferta de reenvio.
pub fn print_summary(job: &Job, summary: &ResultSummary, retry_offered: bool) {
    let palette = Palette::new();
    println!();
    println!(
        "  Progress: {}/{} ({}%)",
        job.completed,
        job.total,
        job.progress_percent()
    );
    println!(
        "  {} {}  {} {}  {} {}",
        palette.green.apply_to("success"),
        summary.success_count,
        palette.yellow.apply_to("business-exempt"),
        summary.business_exempt_count,
        palette.red.apply_to("technical"),
        summary.technical_failure_count
    );
    if retry_offered {
        println!(
            "  {} {} technical failure(s) can be retried: jobtrack retry {} --kind {}",
            palette.yellow.apply_to("↻"),
            summary.technical_failure_count,
            job.id,
            job.kind
        );
    }
}

/// Imprime uma página do histórico de jobs.
pub fn print_history(list: &PaginatedList<JobSummary>) {
    let palette = Palette::new();
    if list.is_empty() {
        println!("  No jobs found.");
        return;
    }
    for job in list.page_rows() {
        let started = job
            .start_time
            .map(|t| t.format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let duration = job
            .duration()
            .map(|d| format!("{}s", d.num_seconds()))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  #{:<6} {:<16} {:<8} {}  total {:<4} {} {:<4} {} {:<4} {} {:<4} {}",
            job.job_id,
            job.kind(),
            job.status,
            started,
            job.total,
            palette.green.apply_to("✓"),
            job.succeeded,
            palette.yellow.apply_to("⚠"),
            job.business_exempt,
            palette.red.apply_to("✗"),
            job.technical_failures,
            palette.dim.apply_to(duration),
        );
    }
    println!(
        "{}",
        palette
            .dim
            .apply_to(format!("  page {}/{}", list.page(), list.page_count()))
    );
}

/// Imprime uma página de candidatos, marcando os selecionados.
pub fn print_candidates(list: &PaginatedList<CandidateItem>, columns: &[&str]) {
    let palette = Palette::new();
    if list.is_empty() {
        println!("  No items found with the current filters.");
        return;
    }
    for item in list.page_rows() {
        let mark = if list.selection().is_selected(&item.id) {
            "[x]"
        } else {
            "[ ]"
        };
        let fields: Vec<String> = columns
            .iter()
            .filter_map(|c| item.field(c))
            .collect();
        println!("  {mark} {:<12} {}", item.id, fields.join(" | "));
    }
    println!(
        "{}",
        palette.dim.apply_to(format!(
            "  page {}/{} · {} item(s) · {} selected",
            list.page(),
            list.page_count(),
            list.len(),
            list.selection().count()
        ))
    );
}

// Largura máxima das barras do gráfico de 7 dias.
const CHART_WIDTH: u64 = 30;

/// Imprime o painel: totais gerais, números por tipo e o gráfico de 7 dias.
pub fn print_dashboard(stats: &DashboardStats) {
    let palette = Palette::new();
    println!();
    println!("  Total jobs: {}", stats.total_jobs);
    for kind in [JobKind::InvoiceEmail, JobKind::Authorization] {
        let k = stats.kind(kind);
        println!(
            "  {:<16} {:>5} run(s)  {:>6} item(s)  {:>6} ok  {}",
            kind,
            k.executions,
            k.processed,
            k.succeeded,
            palette.green.apply_to(format!("{:.1}%", k.success_rate)),
        );
    }

    if stats.last_7_days.is_empty() {
        return;
    }
    println!();
    println!("{}", palette.dim.apply_to("─── Last 7 days ───"));
    let peak = stats
        .last_7_days
        .iter()
        .map(|d| d.total())
        .max()
        .unwrap_or(0)
        .max(1);
    for day in &stats.last_7_days {
        let scale = |n: u64| "█".repeat((n * CHART_WIDTH / peak) as usize);
        println!(
            "  {:<5} {}{} {}/{}",
            day.day,
            palette.green.apply_to(scale(day.invoice_jobs)),
            palette.yellow.apply_to(scale(day.authorization_jobs)),
            day.invoice_jobs,
            day.authorization_jobs,
        );
    }
    println!(
        "{}",
        palette.dim.apply_to(format!(
            "  {} {}  {} {}",
            palette.green.apply_to("█"),
            JobKind::InvoiceEmail,
            palette.yellow.apply_to("█"),
            JobKind::Authorization
        ))
    );
}
