//! Chunk command - chunks one document and prints the chunks as JSON

use clap::Args;
use tracing::info;

use super::{InputArgs, bootstrap, print_json, read_input};
use crate::domain::ingestion::{ChunkingOverrides, ChunkingStrategy};
use crate::infrastructure::services::DocumentChunker;

/// Arguments for the chunk command
#[derive(Args, Clone, Debug)]
pub struct ChunkArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Force a strategy instead of choosing one from the document
    #[arg(long)]
    pub strategy: Option<ChunkingStrategy>,

    /// Target chunk size in characters
    #[arg(long)]
    pub target_size: Option<usize>,

    /// Hard maximum chunk size in characters
    #[arg(long)]
    pub max_size: Option<usize>,

    /// Overlap between consecutive chunks in characters
    #[arg(long)]
    pub overlap: Option<usize>,
}

impl ChunkArgs {
    fn overrides(&self) -> ChunkingOverrides {
        ChunkingOverrides {
            strategy: self.strategy,
            target_size: self.target_size,
            max_size: self.max_size,
            overlap: self.overlap,
            min_chunk_size: None,
        }
    }
}

/// Run the chunk command
pub async fn run(args: ChunkArgs) -> anyhow::Result<()> {
    let config = bootstrap();
    let chunker = DocumentChunker::from_config(&config.pipeline)?;

    let document = read_input(&args.input).await?;
    let chunks = chunker.analyze_and_chunk(
        &document.text,
        document.format_hint,
        Some(&args.overrides()),
    )?;

    info!(
        path = %args.input.path.display(),
        chunks = chunks.len(),
        "Document chunked"
    );

    print_json(&chunks)
}
