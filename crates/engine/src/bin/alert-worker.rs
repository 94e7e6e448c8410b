//! alert-worker: batch runner for the project alert engine.
//!
//! Loads entity snapshots and the recipient directory from JSON, keeps the
//! alert store in `{data_dir}/alerts.json`, and runs one batch operation per
//! invocation, or keeps running them on a schedule with `watch`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use projwatch_core::config::{load_dotenv, Config};
use projwatch_engine::store::{InMemoryAlertStore, InMemoryEntityStore, StaticDirectory};
use projwatch_engine::{AlertEngine, AlertNotifier, EngineError};
use projwatch_notify::{Dispatcher, LogNotifier, TemplateRenderer};
use projwatch_rules::scheduler::{BatchJob, BatchScheduler, JobTrigger};

// ── CLI ─────────────────────────────────────────────────────────────

/// Project alert worker: evaluate, auto-resolve, escalate.
#[derive(Parser, Debug)]
#[command(name = "alert-worker", version, about)]
struct Cli {
    /// Entity snapshots (JSON array). Defaults to `{data_dir}/entities.json`.
    #[arg(long, env = "ALERT_ENTITIES_FILE")]
    entities: Option<PathBuf>,

    /// Recipient directory (JSON). Defaults to `{data_dir}/directory.json`.
    #[arg(long, env = "ALERT_DIRECTORY_FILE")]
    directory: Option<PathBuf>,

    /// Alert store file. Defaults to `{data_dir}/alerts.json`.
    #[arg(long, env = "ALERT_STORE_FILE")]
    alerts: Option<PathBuf>,

    /// Log notifications instead of staying silent.
    #[arg(long, env = "ALERT_NOTIFY_LOG", default_value_t = false)]
    notify_log: bool,

    /// Minijinja template for notification subjects.
    #[arg(long, env = "ALERT_SUBJECT_TEMPLATE", requires = "body_template")]
    subject_template: Option<String>,

    /// Minijinja template for notification bodies.
    #[arg(long, env = "ALERT_BODY_TEMPLATE", requires = "subject_template")]
    body_template: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one full cycle (evaluate, resolve, escalate).
    Run,
    /// Run the escalation pass only.
    Escalate,
    /// Print escalation statistics as JSON.
    Stats,
    /// Keep running batches on a schedule until interrupted.
    Watch {
        /// Full cycle trigger: interval ("1h") or cron ("0 */6 * * *").
        #[arg(long, env = "ALERT_FULL_CYCLE_SCHEDULE", default_value = "1h")]
        full_cycle: String,

        /// Escalation-only trigger.
        #[arg(long, env = "ALERT_ESCALATION_SCHEDULE", default_value = "15m")]
        escalation: String,

        /// Seconds between schedule checks.
        #[arg(long, env = "ALERT_TICK_SECS", default_value_t = 30)]
        tick_secs: u64,
    },
}

// ── Wiring ──────────────────────────────────────────────────────────

struct Worker {
    engine: AlertEngine,
    entities: Arc<InMemoryEntityStore>,
    entities_path: PathBuf,
}

impl Worker {
    fn build(cli: &Cli, config: &Config) -> anyhow::Result<Self> {
        let data_dir = &config.engine.data_dir;
        let entities_path = cli.entities.clone().unwrap_or_else(|| data_dir.join("entities.json"));
        let directory_path = cli.directory.clone().unwrap_or_else(|| data_dir.join("directory.json"));
        let alerts_path = cli.alerts.clone().unwrap_or_else(|| data_dir.join("alerts.json"));

        let entities = Arc::new(
            InMemoryEntityStore::from_json_file(&entities_path)
                .with_context(|| format!("loading entities from {}", entities_path.display()))?,
        );
        let directory = if directory_path.exists() {
            StaticDirectory::from_json_file(&directory_path)
                .with_context(|| format!("loading directory from {}", directory_path.display()))?
        } else {
            warn!(path = %directory_path.display(), "No directory file, every alert will miss its recipient");
            StaticDirectory::new()
        };
        let alerts = InMemoryAlertStore::open(&alerts_path)
            .with_context(|| format!("opening alert store {}", alerts_path.display()))?;
        info!(
            entities = entities.snapshot().len(),
            alerts = alerts.len(),
            store = %alerts_path.display(),
            "Stores loaded"
        );

        let mut engine = AlertEngine::new(entities.clone(), Arc::new(directory), Arc::new(alerts), config);
        if cli.notify_log {
            let dispatcher = Dispatcher::with_defaults(vec![Box::new(LogNotifier::new())]);
            let mut notifier = AlertNotifier::new(dispatcher);
            if let Some(renderer) = custom_renderer(cli)? {
                notifier = notifier.with_renderer(renderer);
            }
            engine = engine.with_notifier(notifier);
        }
        Ok(Self {
            engine,
            entities,
            entities_path,
        })
    }

    /// Status updates live in the entity snapshot file.
    fn save_entities(&self) {
        if let Err(e) = self.entities.save_json_file(&self.entities_path) {
            warn!(path = %self.entities_path.display(), error = %e, "Failed to write entity statuses back");
        }
    }

    async fn full_cycle(&self) -> Result<(), EngineError> {
        let summary = self.engine.run_full_cycle().await?;
        if summary.status_changes > 0 {
            self.save_entities();
        }
        print_json(&summary);
        Ok(())
    }

    async fn escalation_only(&self) {
        let summary = self.engine.run_escalation_only().await;
        print_json(&summary);
    }
}

/// Templates given on the command line, checked before any run starts.
fn custom_renderer(cli: &Cli) -> anyhow::Result<Option<TemplateRenderer>> {
    let (Some(subject), Some(body)) = (&cli.subject_template, &cli.body_template) else {
        return Ok(None);
    };
    let renderer = TemplateRenderer::with_templates(subject.as_str(), body.as_str());
    renderer.validate(subject).context("invalid subject template")?;
    renderer.validate(body).context("invalid body template")?;
    Ok(Some(renderer))
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => warn!(error = %e, "Failed to serialize output"),
    }
}

async fn watch(worker: &Worker, full_cycle: &str, escalation: &str, tick_secs: u64) -> anyhow::Result<()> {
    let mut scheduler = BatchScheduler::new();
    scheduler.schedule(BatchJob::FullCycle, JobTrigger::parse(full_cycle)?);
    scheduler.schedule(BatchJob::EscalationOnly, JobTrigger::parse(escalation)?);
    info!(full_cycle, escalation, tick_secs, "alert-worker watching");

    let mut tick = tokio::time::interval(Duration::from_secs(tick_secs.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = tick.tick() => {
                let now = Utc::now();
                let due = scheduler.due_jobs(now);
                // A full cycle already includes escalation.
                let jobs = if due.contains(&BatchJob::FullCycle) {
                    vec![BatchJob::FullCycle]
                } else {
                    due
                };
                for job in jobs {
                    info!(job = job.as_str(), "Running scheduled batch");
                    match job {
                        BatchJob::FullCycle => {
                            if let Err(e) = worker.full_cycle().await {
                                error!(error = %e, "Full cycle failed");
                            }
                            scheduler.record_run_at(BatchJob::EscalationOnly, now);
                        }
                        BatchJob::EscalationOnly => worker.escalation_only().await,
                    }
                    scheduler.record_run_at(job, now);
                }
            }
            _ = &mut shutdown => {
                info!("Interrupted, stopping");
                break;
            }
        }
    }
    Ok(())
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary();

    let worker = Worker::build(&cli, &config)?;

    match &cli.command {
        Command::Run => worker.full_cycle().await?,
        Command::Escalate => worker.escalation_only().await,
        Command::Stats => print_json(&worker.engine.escalation_stats().await?),
        Command::Watch {
            full_cycle,
            escalation,
            tick_secs,
        } => watch(&worker, full_cycle, escalation, *tick_secs).await?,
    }
    Ok(())
}
