//! Large command - chunks an oversized document in parallel windows

use std::sync::Arc;

use clap::Args;
use tokio::signal;
use tracing::{info, warn};

use super::{InputArgs, bootstrap, print_json, read_input};
use crate::infrastructure::indexing::{HashEmbedder, InMemoryIndexStore, InMemoryStateStore};
use crate::infrastructure::ingestion::CancellationFlag;
use crate::infrastructure::services::DocumentPipeline;

/// Arguments for the large command
#[derive(Args, Clone, Debug)]
pub struct LargeArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Window size in characters (overrides config)
    #[arg(long)]
    pub unit_size: Option<usize>,

    /// Worker pool size (overrides config)
    #[arg(long)]
    pub workers: Option<usize>,
}

/// Run the large command
pub async fn run(args: LargeArgs) -> anyhow::Result<()> {
    let mut config = bootstrap();
    if let Some(workers) = args.workers {
        config.pipeline.worker_pool_size = workers;
    }

    // Chunking only: the stores are never written
    let pipeline = DocumentPipeline::from_config(
        &config.pipeline,
        Arc::new(HashEmbedder::default()),
        Arc::new(InMemoryIndexStore::new()),
        Arc::new(InMemoryStateStore::new()),
    )?;

    let document = read_input(&args.input).await?;

    let cancel = CancellationFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, cancelling remaining windows");
            on_interrupt.cancel();
        }
    });

    let outcome = pipeline
        .process_large_document(&document.text, args.unit_size, document.format_hint, &cancel)
        .await?;

    info!(
        windows = outcome.windows_total,
        failed = outcome.failed_windows.len(),
        chunks = outcome.chunks.len(),
        "Large document processed"
    );

    print_json(&outcome)
}
