//! Interface de terminal do dashboard: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`ActionProgress`] acompanha visualmente uma ação
//! pendente; as funções `render_*` montam as tabelas de jobs e artefatos.

use chrono::{DateTime, Local, NaiveDateTime};
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::api::Artifact;
use crate::dispatch::{ActionKind, ActionOutcome};
use crate::error::ActionError;
use crate::sync::{StatusClass, StatusTable, SyncSnapshot};

const EMPTY_JOBS_HINT: &str = "No jobs yet. Upload a file to get started.";

/// Estilos de cor por classe de status.
#[derive(Debug, Clone)]
pub struct Palette {
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }
}

impl Palette {
    pub fn for_class(&self, class: StatusClass) -> &Style {
        match class {
            StatusClass::Success => &self.green,
            StatusClass::Error => &self.red,
            StatusClass::InProgress => &self.yellow,
            StatusClass::Unknown => &self.dim,
        }
    }
}

/// Indicador visual de progresso para uma ação pendente no terminal.
///
/// Exibe um spinner animado enquanto a requisição está em voo e mensagens
/// coloridas para sucesso (verde) e falha (vermelho).
pub struct ActionProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    palette: Palette,
}

impl ActionProgress {
    /// Inicia o spinner com a descrição da ação.
    pub fn start(kind: ActionKind, target: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("{kind}: {target}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            palette: Palette::default(),
        }
    }

    /// Finaliza o spinner e exibe o resultado da ação.
    pub fn complete(&self, result: &Result<ActionOutcome, ActionError>) {
        self.pb.finish_and_clear();
        match result {
            Ok(outcome) => {
                println!("  {} {}", self.palette.green.apply_to("✓"), outcome.message);
            }
            Err(err) => {
                println!("  {} {err}", self.palette.red.apply_to("✗"));
            }
        }
    }
}

/// Tabela de jobs de um snapshot, com a linha de erro no topo quando houver.
pub fn render_jobs(snapshot: &SyncSnapshot, table: &StatusTable, palette: &Palette) -> String {
    let mut out = String::new();
    if let Some(err) = &snapshot.error {
        out.push_str(&format!("{}\n", palette.red.apply_to(format!("! {err}"))));
    }
    if snapshot.jobs.is_empty() {
        out.push_str(&format!("{}\n", palette.dim.apply_to(EMPTY_JOBS_HINT)));
        return out;
    }

    let id_width = snapshot
        .jobs
        .iter()
        .map(|j| j.id.len())
        .max()
        .unwrap_or(0)
        .max(2);
    let status_width = snapshot
        .jobs
        .iter()
        .map(|j| j.status.len())
        .max()
        .unwrap_or(0)
        .max(6);

    out.push_str(&format!(
        "{:<id_width$}  {:<status_width$}  {:<19}  {}\n",
        "ID", "STATUS", "CREATED", "UPDATED"
    ));
    for job in &snapshot.jobs {
        let class = table.classify(&job.status);
        let status = format!("{:<status_width$}", job.status);
        out.push_str(&format!(
            "{:<id_width$}  {}  {:<19}  {}\n",
            job.id,
            palette.for_class(class).apply_to(status),
            format_timestamp(job.created_at.as_deref()),
            format_timestamp(job.updated_at.as_deref()),
        ));
    }
    out
}

/// Lista de artefatos com tamanho legível e URL de download.
pub fn render_artifacts<F>(artifacts: &[Artifact], url_for: F) -> String
where
    F: Fn(&str) -> String,
{
    if artifacts.is_empty() {
        return "No artifacts found.\n".to_string();
    }
    let name_width = artifacts.iter().map(|a| a.name.len()).max().unwrap_or(0);
    artifacts
        .iter()
        .map(|a| {
            let size = a.size.map(human_size).unwrap_or_default();
            format!(
                "{:<name_width$}  {:>10}  {}\n",
                a.name,
                size,
                url_for(&a.name)
            )
        })
        .collect()
}

/// Bytes em B/KB/MB/GB com uma casa decimal.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Horário local quando o servidor manda algo parseável, senão o texto cru.
pub fn format_timestamp(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return "-".to_string();
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return ts.format("%Y-%m-%d %H:%M:%S").to_string();
        }
    }
    raw.to_string()
}
