//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use skydrop_http::HttpSessionApi;
use skydrop_transfer::{SourceFile, derive_session_key};
use skydrop_uploader::{
    EngineConfig, IngestOutcome, IngestQueue, ProgressSink, TerminalOutcome, UploadOrchestrator,
    scan_sources,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;
use crate::progress::{UploadBars, format_bytes};

fn connect(config: &Config) -> anyhow::Result<Arc<HttpSessionApi>> {
    let api = HttpSessionApi::new(
        &config.base_url,
        config.token.as_deref(),
        config.request_timeout(),
    )
    .with_context(|| format!("cannot reach {}", config.base_url))?;
    Ok(Arc::new(api))
}

/// Uploads files and directories as one ingest batch.
pub async fn upload(
    config: &Config,
    engine: EngineConfig,
    paths: &[PathBuf],
    destination: Option<i64>,
) -> anyhow::Result<()> {
    let files = scan_sources(paths).await?;
    if files.is_empty() {
        bail!("nothing to upload");
    }
    let total: u64 = files.iter().map(|f| f.size).sum();
    info!(files = files.len(), bytes = total, "uploading {}", format_bytes(total));

    let mut queue = IngestQueue::new(connect(config)?, engine);
    let events = queue
        .take_events()
        .context("event receiver already taken")?;

    let cancel = queue.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling uploads");
            cancel.cancel();
        }
    });

    let names = files.iter().map(|f| f.name.clone()).collect();
    let renderer = tokio::spawn(UploadBars::new(names).run(events));

    let report = queue.ingest(files, destination).await;
    // Closes the event channel so the renderer drains and exits.
    drop(queue);
    let _ = renderer.await;

    for entry in &report.entries {
        match &entry.outcome {
            IngestOutcome::Success { file } => {
                println!("uploaded  {}  (id {})", entry.file_name, file.id);
            }
            IngestOutcome::Failure { kind, reason } => {
                println!("FAILED    {}  [{kind:?}] {reason}", entry.file_name);
            }
            IngestOutcome::Aborted => println!("cancelled {}", entry.file_name),
        }
    }

    if report.failures > 0 {
        bail!(
            "{} of {} file(s) did not upload",
            report.failures,
            report.entries.len()
        );
    }
    Ok(())
}

/// Retries assembly of a fully uploaded session.
pub async fn finalize(config: &Config, session_key: &str) -> anyhow::Result<()> {
    let orchestrator = UploadOrchestrator::new(connect(config)?, config.engine.clone());
    // Finalize emits at most a status, a progress and a terminal event.
    let (tx, _rx) = mpsc::channel(8);
    let sink = ProgressSink::new(session_key, tx);

    match orchestrator.retry_finalize(session_key, &sink).await {
        TerminalOutcome::Completed(file) => {
            println!("assembled {} (id {})", file.name, file.id);
            Ok(())
        }
        TerminalOutcome::Failed(e) => Err(e).context("finalize failed"),
        TerminalOutcome::Aborted => bail!("cancelled"),
    }
}

/// Prints the server view of a session.
pub async fn status(config: &Config, session_key: &str) -> anyhow::Result<()> {
    let orchestrator = UploadOrchestrator::new(connect(config)?, config.engine.clone());
    let desc = orchestrator.status(session_key).await?;

    let uploaded = desc.uploaded_chunks.len() as u32;
    let missing = desc.total_chunks.saturating_sub(uploaded);
    println!("session     {}", desc.upload_id);
    println!("chunk size  {}", format_bytes(desc.chunk_size));
    println!(
        "chunks      {uploaded}/{} uploaded, {missing} missing",
        desc.total_chunks
    );
    Ok(())
}

/// Discards a session on the server.
pub async fn abort(config: &Config, session_key: &str) -> anyhow::Result<()> {
    let orchestrator = UploadOrchestrator::new(connect(config)?, config.engine.clone());
    orchestrator.abort(session_key).await?;
    println!("aborted {session_key}");
    Ok(())
}

/// Prints the session key `path` would upload under.
pub async fn key(path: &Path, destination: Option<i64>) -> anyhow::Result<()> {
    let file = SourceFile::from_path(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    println!(
        "{}",
        derive_session_key(&file.name, file.size, file.modified_ms, destination)
    );
    Ok(())
}
