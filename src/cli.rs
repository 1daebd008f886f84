//! Command-line entry point. Builds one `AppContext` against `--catalog` and dispatches to
//! it; no subcommand here touches `rusqlite`, `reqwest`, or the filesystem layout directly --
//! that all lives behind the library's modules. One `Commands` enum, dispatched from `main`,
//! against this crate's session/repository/jobs architecture.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;

use reelvault_core::config::Config;
use reelvault_core::copy::CancellationToken;
use reelvault_core::error::{ReelVaultError, Result};
use reelvault_core::jobs::progress;
use reelvault_core::jobs::runner;
use reelvault_core::jobs::worker::WorkerPool;
use reelvault_core::manifest;
use reelvault_core::repository::{
    CameraRepository, FileRepository, JobRepository, JobStatus, NewProjectRecord, ProjectRecord,
    ProjectRepository, SessionRepository,
};
use reelvault_core::session;
use reelvault_core::AppContext;

#[derive(Parser)]
#[command(name = "reelvault", version, about = "Resumable, content-addressed ingest engine for wedding-film production")]
struct Cli {
    /// Archive root holding the `.reelvault/` catalog database and every project folder.
    #[arg(long, global = true, default_value = ".")]
    catalog: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new project folder (source/thumbnails/gallery/proxies/documents) and its catalog row.
    Init {
        /// Folder name under the catalog root; also the default project name.
        folder: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// List projects in the catalog.
    Projects,
    /// Start a new import session from one or more source paths.
    Ingest {
        /// Project id or folder name to ingest into.
        #[arg(long)]
        project: String,
        /// Source directories or files to scan.
        sources: Vec<PathBuf>,
    },
    /// Resume an interrupted import session by id, or every resumable session if omitted.
    Resume { session_id: Option<String> },
    /// List sessions for a project.
    Sessions {
        #[arg(long)]
        project: String,
    },
    /// Job-queue operations.
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },
    /// Project document operations.
    Documents {
        #[command(subcommand)]
        action: DocumentsAction,
    },
    /// Camera catalog operations.
    Cameras {
        #[command(subcommand)]
        action: CamerasAction,
    },
    /// ML-extractor background service lifecycle.
    Background {
        #[command(subcommand)]
        action: BackgroundAction,
    },
}

#[derive(Subcommand)]
enum JobsAction {
    /// Drain every pending, dependency-satisfied job on the current thread until none remain.
    Run,
    /// Run a concurrency-capped worker pool for a fixed duration, then shut down cleanly.
    Watch {
        #[arg(long, default_value_t = 30)]
        seconds: u64,
    },
    /// List jobs, optionally filtered to one status (pending, processing, complete, error, dead).
    List {
        #[arg(long)]
        status: Option<String>,
    },
    /// List jobs dead-lettered after exhausting their retries.
    DeadLetters,
    /// Acknowledge dead-lettered jobs so they stop showing up in `dead-letters`.
    Ack { ids: Vec<i64> },
    /// Re-enqueue one dead-lettered job by id, or every unacknowledged one if omitted.
    RetryDeadLetter { id: Option<i64> },
}

fn parse_job_status_arg(s: &str) -> Result<JobStatus> {
    match s.to_lowercase().as_str() {
        "pending" => Ok(JobStatus::Pending),
        "processing" => Ok(JobStatus::Processing),
        "complete" => Ok(JobStatus::Complete),
        "error" => Ok(JobStatus::Error),
        "dead" => Ok(JobStatus::Dead),
        other => Err(ReelVaultError::Other(format!("unknown job status '{other}'"))),
    }
}

#[derive(Subcommand)]
enum DocumentsAction {
    /// Rewrite manifest.json, project.json, cameras.json, import-log.json and README.txt.
    Refresh {
        #[arg(long)]
        project: String,
    },
}

#[derive(Subcommand)]
enum CamerasAction {
    List,
}

#[derive(Subcommand)]
enum BackgroundAction {
    Start { executable: PathBuf, args: Vec<String> },
    Stop,
    Status,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let ctx = AppContext::open(&cli.catalog)?;

    match cli.command {
        Commands::Init { folder, name } => cmd_init(&ctx, &cli.catalog, &folder, name),
        Commands::Projects => cmd_projects(&ctx),
        Commands::Ingest { project, sources } => cmd_ingest(&ctx, &project, sources),
        Commands::Resume { session_id } => cmd_resume(&ctx, session_id),
        Commands::Sessions { project } => cmd_sessions(&ctx, &project),
        Commands::Jobs { action } => cmd_jobs(&ctx, action),
        Commands::Documents { action } => cmd_documents(&ctx, action),
        Commands::Cameras { action } => cmd_cameras(&ctx, action),
        Commands::Background { action } => cmd_background(&ctx, action),
    }
}

fn cmd_init(ctx: &AppContext, catalog_root: &PathBuf, folder: &str, name: Option<String>) -> Result<()> {
    let project_root = catalog_root.join(folder);
    for sub in ["source", "thumbnails", "gallery", "proxies", "documents"] {
        std::fs::create_dir_all(project_root.join(sub))?;
    }

    let project = ProjectRepository::create(
        ctx.repo.as_ref(),
        &NewProjectRecord {
            name: name.unwrap_or_else(|| folder.to_string()),
            folder_name: folder.to_string(),
            working_root: catalog_root.to_string_lossy().to_string(),
            key_dates: json!({}),
        },
    )?;

    let toml_path = Config::default_path_in(catalog_root);
    if !toml_path.exists() {
        std::fs::write(
            &toml_path,
            "# reelvault.toml -- override any Config field here, e.g.\n# [copy]\n# abort_threshold = 3\n",
        )?;
    }

    println!("created project {} (id {}) at {}", project.name, project.id, project_root.display());
    Ok(())
}

fn cmd_projects(ctx: &AppContext) -> Result<()> {
    for project in ctx.repo.list_all()? {
        println!("{}\t{}\t{}", project.id, project.folder_name, project.name);
    }
    Ok(())
}

fn resolve_project(ctx: &AppContext, identifier: &str) -> Result<ProjectRecord> {
    if let Ok(id) = identifier.parse::<i64>() {
        if let Some(project) = ProjectRepository::find_by_id(ctx.repo.as_ref(), id)? {
            return Ok(project);
        }
    }
    ctx.repo
        .list_all()?
        .into_iter()
        .find(|p| p.folder_name == identifier)
        .ok_or_else(|| ReelVaultError::ProjectNotFound(identifier.to_string()))
}

fn cmd_ingest(ctx: &AppContext, project_ident: &str, sources: Vec<PathBuf>) -> Result<()> {
    if sources.is_empty() {
        return Err(ReelVaultError::Other("ingest requires at least one source path".to_string()));
    }
    let project = resolve_project(ctx, project_ident)?;

    let session_ctx = session::SessionContext {
        files: ctx.repo.as_ref(),
        cameras: ctx.repo.as_ref(),
        projects: ctx.repo.as_ref(),
        sessions: ctx.repo.as_ref(),
        jobs: ctx.repo.as_ref(),
        providers: &ctx.providers,
        config: &ctx.config,
    };

    let cancel = CancellationToken::new();
    let (sink, source) = progress::channel();
    let row = session::start_session(&session_ctx, &project, sources, &cancel, Some(&sink))?;
    drain_progress(&source);

    println!(
        "session {} finished as {} ({} processed, {} duplicate, {} error of {} total)",
        row.id,
        row.status.as_str(),
        row.processed_files,
        row.duplicate_files,
        row.error_files,
        row.total_files
    );
    Ok(())
}

fn cmd_resume(ctx: &AppContext, session_id: Option<String>) -> Result<()> {
    let session_ctx = session::SessionContext {
        files: ctx.repo.as_ref(),
        cameras: ctx.repo.as_ref(),
        projects: ctx.repo.as_ref(),
        sessions: ctx.repo.as_ref(),
        jobs: ctx.repo.as_ref(),
        providers: &ctx.providers,
        config: &ctx.config,
    };
    let cancel = CancellationToken::new();
    let (sink, source) = progress::channel();

    match session_id {
        Some(id) => {
            let row = session::resume_session(&session_ctx, &id, &cancel, Some(&sink))?;
            drain_progress(&source);
            println!("session {} finished as {}", row.id, row.status.as_str());
        }
        None => {
            let rows = session::resume_all_pending(&session_ctx, &cancel, Some(&sink))?;
            drain_progress(&source);
            println!("resumed {} session(s)", rows.len());
            for row in rows {
                println!("  {} -> {}", row.id, row.status.as_str());
            }
        }
    }
    Ok(())
}

fn drain_progress(source: &progress::EventSource) {
    for event in source.try_iter() {
        if event.is_error {
            log::warn!("[{}] {}: {}", event.phase, event.job_id, event.error_message.unwrap_or_default());
        } else {
            log::info!("[{}] {}/{} ({:.0}%)", event.phase, event.current, event.total, event.percent);
        }
    }
}

fn cmd_sessions(ctx: &AppContext, project_ident: &str) -> Result<()> {
    let project = resolve_project(ctx, project_ident)?;
    for row in SessionRepository::list_by_project(ctx.repo.as_ref(), project.id)? {
        println!(
            "{}\t{}\t{}/{} files\tresumable={}",
            row.id,
            row.status.as_str(),
            row.processed_files,
            row.total_files,
            row.resumable
        );
    }
    Ok(())
}

fn cmd_jobs(ctx: &AppContext, action: JobsAction) -> Result<()> {
    match action {
        JobsAction::Run => {
            let summary = runner::run_until_drained(
                ctx.repo.as_ref(),
                ctx.repo.as_ref(),
                ctx.repo.as_ref(),
                ctx.ml_service.as_deref(),
                ctx.config.job_queue.base_backoff_seconds,
                ctx.config.job_queue.lease_duration_seconds,
            )?;
            println!("completed {} job(s), failed {}", summary.completed, summary.failed);
        }
        JobsAction::Watch { seconds } => {
            let (sink, source) = progress::channel();
            let pool = WorkerPool::spawn(
                Arc::clone(&ctx.repo) as Arc<dyn JobRepository + Send + Sync>,
                Arc::clone(&ctx.repo) as Arc<dyn FileRepository + Send + Sync>,
                Arc::clone(&ctx.repo) as Arc<dyn ProjectRepository + Send + Sync>,
                ctx.ml_service.clone(),
                ctx.config.job_queue.clone(),
                sink,
            );
            std::thread::sleep(Duration::from_secs(seconds));
            pool.shutdown();
            drain_progress(&source);
        }
        JobsAction::List { status } => {
            let filter = status.as_deref().map(parse_job_status_arg).transpose()?;
            for job in ctx.repo.list(filter)? {
                println!(
                    "{}\t{}\t{}\tretries={}/{}\t{}",
                    job.id,
                    job.kind.as_str(),
                    job.status.as_str(),
                    job.retry_count,
                    job.max_retries,
                    job.error.as_deref().unwrap_or("")
                );
            }
        }
        JobsAction::DeadLetters => {
            for entry in ctx.repo.list_dead_letters()? {
                println!(
                    "{}\tjob {}\t{}\t{}\tacked={}",
                    entry.id, entry.job_id, entry.kind.as_str(), entry.error, entry.acknowledged
                );
            }
        }
        JobsAction::Ack { ids } => {
            ctx.repo.acknowledge(&ids)?;
            println!("acknowledged {} dead letter(s)", ids.len());
        }
        JobsAction::RetryDeadLetter { id } => {
            let retried = ctx.repo.retry_dead_letter(id)?;
            println!("re-enqueued {retried} dead letter(s)");
        }
    }
    Ok(())
}

fn cmd_documents(ctx: &AppContext, action: DocumentsAction) -> Result<()> {
    let DocumentsAction::Refresh { project: project_ident } = action;
    let project = resolve_project(ctx, &project_ident)?;
    let project_root = PathBuf::from(&project.working_root).join(&project.folder_name);

    let files = FileRepository::list_by_project(ctx.repo.as_ref(), project.id)?;
    let cameras = ctx.repo.find_all_with_patterns()?;
    let sessions = SessionRepository::list_by_project(ctx.repo.as_ref(), project.id)?;

    manifest::write_all_documents(&project_root, &project, &files, &cameras, &sessions)?;
    println!("documents refreshed under {}", project_root.join("documents").display());
    Ok(())
}

fn cmd_cameras(ctx: &AppContext, action: CamerasAction) -> Result<()> {
    let CamerasAction::List = action;
    for cam in ctx.repo.find_all_with_patterns()? {
        println!(
            "{}\t{}\t{}\tdefault={}\tactive={}",
            cam.id, cam.display_name, cam.medium.as_str(), cam.is_default, cam.active
        );
    }
    Ok(())
}

fn cmd_background(ctx: &AppContext, action: BackgroundAction) -> Result<()> {
    match action {
        BackgroundAction::Start { executable, args } => {
            ctx.start_ml_service(&executable, &args)?;
            println!("ML-extractor started and healthy");
        }
        BackgroundAction::Stop => {
            ctx.stop_ml_service()?;
            println!("ML-extractor stopped");
        }
        BackgroundAction::Status => {
            let idle = ctx.ml_service.as_ref().map(|s| s.lock().unwrap().is_idle()).unwrap_or(true);
            println!("idle={idle}");
        }
    }
    Ok(())
}
