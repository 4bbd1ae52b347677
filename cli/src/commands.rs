//! CLI parser and command implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use banrakshak::{
    load_config, ClientConfig, RemoteDelete, Task, TaskEventKind, TaskManager, TaskStatus,
    UploadFile,
};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::task::JoinSet;

#[derive(Parser)]
#[command(name = "banrakshak")]
#[command(about = "Submit FRA documents for OCR and entity extraction")]
#[command(version)]
pub struct Cli {
    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config file and environment)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload documents and wait for their results
    Process {
        /// PDF or image files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Write each finished task as JSON into this directory
        #[arg(long)]
        export_dir: Option<PathBuf>,
        /// Document language recorded in task metadata
        #[arg(long)]
        language: Option<String>,
    },

    /// List tasks known to the backend
    Tasks,

    /// Check backend health
    Health,

    /// Delete a task on the backend
    Delete {
        task_id: String,
    },
}

fn resolve_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ClientConfig::default(),
    };

    let mut config = config.with_env_overrides();
    if let Some(url) = &cli.api_url {
        config = config.with_base_url(url.clone());
    }
    Ok(config)
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = resolve_config(&cli)?;

    match cli.command {
        Commands::Process {
            files,
            export_dir,
            language,
        } => {
            if let Some(language) = language {
                config.language = language;
            }
            cmd_process(config, files, export_dir).await
        }
        Commands::Tasks => cmd_tasks(config).await,
        Commands::Health => cmd_health(config).await,
        Commands::Delete { task_id } => cmd_delete(config, &task_id).await,
    }
}

async fn read_accepted(paths: Vec<PathBuf>) -> Vec<UploadFile> {
    let mut files = Vec::new();
    for path in paths {
        match UploadFile::from_path(&path).await {
            Ok(file) if file.is_accepted() => files.push(file),
            Ok(file) => warn!(
                "Skipping {}: unsupported type {}",
                path.display(),
                file.mime_type
            ),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }
    files
}

async fn cmd_process(
    config: ClientConfig,
    paths: Vec<PathBuf>,
    export_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    config.require_base_url()?;

    let files = read_accepted(paths).await;
    if files.is_empty() {
        bail!("No PDF or image files to process");
    }

    let manager = Arc::new(TaskManager::new(config));
    let mut events = manager.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if event.kind == TaskEventKind::Updated {
                info!(
                    "{} [{}] {} {}%",
                    event.task.filename, event.task_id, event.task.status, event.task.progress
                );
            }
        }
    });

    let mut uploads = JoinSet::new();
    for file in files {
        let manager = Arc::clone(&manager);
        uploads.spawn(async move { manager.upload(file).await });
    }

    let mut submitted = Vec::new();
    while let Some(joined) = uploads.join_next().await {
        submitted.push(joined??);
    }

    let mut waits = JoinSet::new();
    for task in &submitted {
        let manager = Arc::clone(&manager);
        let task_id = task.id.clone();
        waits.spawn(async move { manager.wait_until_settled(&task_id).await });
    }

    let mut finished = Vec::new();
    while let Some(joined) = waits.join_next().await {
        if let Some(task) = joined? {
            finished.push(task);
        }
    }
    finished.sort_by_key(|t| t.upload_time);

    manager.shutdown();
    printer.abort();

    for task in &finished {
        print_summary(task);
    }

    if let Some(dir) = export_dir {
        export_tasks(&manager, &finished, &dir).await?;
    }

    let failed = finished
        .iter()
        .filter(|t| t.status == TaskStatus::Error)
        .count();
    if failed == finished.len() {
        bail!("All {} document(s) failed", failed);
    }
    Ok(())
}

fn print_summary(task: &Task) {
    println!("{} ({})", task.filename, task.id);
    println!("  status: {}", task.status);

    if let Some(error) = &task.error {
        println!("  error: {}", error);
    }
    if let Some(error) = &task.result_error {
        println!("  result unavailable: {}", error);
    }
    if let Some(classification) = &task.classification {
        println!(
            "  type: {} ({:?}, {:.0}%)",
            classification.document_type,
            classification.confidence_level,
            classification.confidence_score
        );
    }
    if let Some(entities) = &task.entities {
        println!("  entities: {}", entities.len());
        for entity in entities {
            println!(
                "    {:<12} {} ({:.0}%)",
                entity.label,
                entity.text,
                entity.confidence * 100.0
            );
        }
    }
    if let Some(fields) = &task.extracted_fields {
        for (key, value) in fields {
            println!("  {}: {}", key, value);
        }
    }
}

async fn export_tasks(manager: &TaskManager, tasks: &[Task], dir: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    for task in tasks {
        let Some(json) = manager.store().export_json(&task.id) else {
            continue;
        };
        let path = dir.join(format!("{}.json", task.id));
        tokio::fs::write(&path, json?)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Exported {} to {}", task.id, path.display());
    }
    Ok(())
}

async fn cmd_tasks(config: ClientConfig) -> anyhow::Result<()> {
    let manager = TaskManager::new(config);
    let list = manager.list_remote_tasks().await?;

    if list.tasks.is_empty() {
        println!("No tasks on the backend");
        return Ok(());
    }

    for task in &list.tasks {
        println!(
            "{:<38} {:<11} {:>5.1}%  {}",
            task.id, task.status, task.progress, task.filename
        );
    }
    println!("{} task(s)", list.total);
    Ok(())
}

async fn cmd_health(config: ClientConfig) -> anyhow::Result<()> {
    let manager = TaskManager::new(config);
    let health = manager.health().await?;

    println!("status: {}", health.status);
    for (service, up) in &health.services {
        println!("  {:<12} {}", service, if *up { "up" } else { "down" });
    }

    if !health.is_healthy() {
        bail!("Backend reports status '{}'", health.status);
    }
    Ok(())
}

async fn cmd_delete(config: ClientConfig, task_id: &str) -> anyhow::Result<()> {
    config.require_base_url()?;
    let manager = TaskManager::new(config);

    match manager.delete(task_id).await.remote {
        RemoteDelete::Deleted => {
            println!("Deleted {}", task_id);
            Ok(())
        }
        RemoteDelete::Skipped => bail!("{} is a local placeholder id", task_id),
        RemoteDelete::Failed(reason) => bail!("Failed to delete {}: {}", task_id, reason),
    }
}
