use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use console::Term;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use automation_dashboard::api::{ApiClient, JobsApi};
use automation_dashboard::cli::{Cli, Command};
use automation_dashboard::config::DashboardConfig;
use automation_dashboard::dispatch::{Action, ActionDispatcher};
use automation_dashboard::session::SessionStore;
use automation_dashboard::sync::{JobSynchronizer, StatusTable, SyncSnapshot};
use automation_dashboard::ui::{self, ActionProgress, Palette};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => DashboardConfig::load_from(path)?,
        None => DashboardConfig::load()?,
    };
    if let Some(base) = &cli.api_base {
        config.api_base = base.clone();
    }

    let client = Arc::new(ApiClient::new(&config.api_base).context("invalid API base URL")?);
    let session = Arc::new(SessionStore::load(&config.state_file)?);
    let table = config.status_table()?;
    let palette = Palette::default();
    tracing::debug!(base = %client.base_url(), "client ready");

    // Ctrl-C cancels whatever request is pending.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Upload { file } => {
            let target = file.display().to_string();
            let dispatcher = ActionDispatcher::new(client, session);
            return run_action(&dispatcher, Action::Upload { path: file }, &target, &cancel).await;
        }
        Command::Jobs { watch: false } => {
            let jobs = client.list_jobs(&cancel).await?;
            let snapshot = SyncSnapshot { jobs, error: None };
            print!("{}", ui::render_jobs(&snapshot, &table, &palette));
        }
        Command::Jobs { watch: true } => {
            watch_jobs(client, &config, &table, &palette, &cancel).await;
        }
        Command::Select { job } => {
            let job_id = job.trim();
            if job_id.is_empty() {
                println!("Select a job first: pass a non-empty job ID.");
                return Ok(ExitCode::FAILURE);
            }
            session.remember_job(job_id);
            println!("Selected job {job_id}");
        }
        Command::Artifacts { job } => {
            let Some(job_id) = selected_job(&session, job.as_deref(), &client, &cancel).await
            else {
                return Ok(ExitCode::FAILURE);
            };
            let artifacts = client.list_artifacts(&job_id, &cancel).await?;
            print!(
                "{}",
                ui::render_artifacts(&artifacts, |name| client
                    .artifact_url(&job_id, name)
                    .to_string())
            );
        }
        Command::Download { name, job, out } => {
            let Some(job_id) = selected_job(&session, job.as_deref(), &client, &cancel).await
            else {
                return Ok(ExitCode::FAILURE);
            };
            let bytes = client.download_artifact(&job_id, &name, &cancel).await?;
            let file_name = Path::new(&name)
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "artifact".into());
            tokio::fs::create_dir_all(&out)
                .await
                .with_context(|| format!("failed to create {}", out.display()))?;
            let dest = out.join(file_name);
            tokio::fs::write(&dest, &bytes)
                .await
                .with_context(|| format!("failed to write {}", dest.display()))?;
            println!("Saved {} ({})", dest.display(), ui::human_size(bytes.len() as u64));
        }
        Command::Generate { job } => {
            let Some(job_id) = selected_job(&session, job.as_deref(), &client, &cancel).await
            else {
                return Ok(ExitCode::FAILURE);
            };
            let dispatcher = ActionDispatcher::new(client, session);
            let target = job_id.clone();
            return run_action(&dispatcher, Action::Generate { job_id }, &target, &cancel).await;
        }
        Command::Execute { job } => {
            let Some(job_id) = selected_job(&session, job.as_deref(), &client, &cancel).await
            else {
                return Ok(ExitCode::FAILURE);
            };
            let dispatcher = ActionDispatcher::new(client, session);
            let target = job_id.clone();
            return run_action(&dispatcher, Action::Execute { job_id }, &target, &cancel).await;
        }
        Command::Report { job } => {
            let Some(job_id) = selected_job(&session, job.as_deref(), &client, &cancel).await
            else {
                return Ok(ExitCode::FAILURE);
            };
            println!("{}", client.report_url(&job_id));
        }
        Command::Status => {
            println!("API base:       {}", client.base_url());
            println!("Poll interval:  {}ms", config.poll_interval().as_millis());
            println!("State file:     {}", config.state_file.display());
            println!("Status tokens:  {}", table.len());
            println!(
                "Selected job:   {}",
                session.last_job_id().unwrap_or_else(|| "-".to_string())
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "automation_dashboard=debug"
    } else {
        "automation_dashboard=warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn selected_job(
    session: &SessionStore,
    explicit: Option<&str>,
    client: &ApiClient,
    cancel: &CancellationToken,
) -> Option<String> {
    let job = session.select_job(explicit, client, cancel).await;
    if job.is_none() {
        println!("Select a job first: pass --job <ID>, run `select <ID>` or upload a file.");
    }
    job
}

async fn run_action(
    dispatcher: &ActionDispatcher<ApiClient>,
    action: Action,
    target: &str,
    cancel: &CancellationToken,
) -> Result<ExitCode> {
    let progress = ActionProgress::start(action.kind(), target);
    let result = dispatcher.dispatch(action, cancel).await;
    progress.complete(&result);
    Ok(match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    })
}

/// Redraws the job table on every snapshot until Ctrl-C.
async fn watch_jobs(
    client: Arc<ApiClient>,
    config: &DashboardConfig,
    table: &StatusTable,
    palette: &Palette,
    cancel: &CancellationToken,
) {
    let sync = JobSynchronizer::with_interval(client, config.poll_interval());
    let mut subscription = sync.subscribe();
    sync.start();
    let term = Term::stdout();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = subscription.recv() => {
                let Some(snapshot) = next else { break };
                let _ = term.clear_screen();
                println!(
                    "Jobs (polling every {}ms, Ctrl-C to quit)\n",
                    config.poll_interval().as_millis()
                );
                print!("{}", ui::render_jobs(&snapshot, table, palette));
            }
        }
    }

    subscription.unsubscribe();
    sync.stop();
}
