//! CLI module for the chunk indexer
//!
//! Provides subcommands for working with documents from the shell:
//! - `chunk`: chunk a file and print the chunks as JSON
//! - `analyze`: print document features and the chosen chunking parameters
//! - `large`: chunk an oversized file in parallel windows
//! - `index`: reindex a file against persisted document state
//! - `diff`: preview the reindex outcome between two versions of a file

pub mod analyze;
pub mod chunk;
pub mod diff;
pub mod index;
pub mod large;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::AppConfig;
use crate::domain::ingestion::{FormatHint, ReadOutput, Reader};
use crate::infrastructure::ingestion::FileReader;
use crate::infrastructure::logging;

/// PMP Chunk Indexer - structure-aware chunking with incremental re-indexing
#[derive(Parser)]
#[command(name = "pmp-chunk-indexer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Chunk a document and print the chunks
    Chunk(chunk::ChunkArgs),

    /// Describe a document and the parameters it would be chunked with
    Analyze(analyze::AnalyzeArgs),

    /// Chunk an oversized document in parallel windows
    Large(large::LargeArgs),

    /// Reindex a document against state kept on disk
    Index(index::IndexArgs),

    /// Preview the reindex outcome between two versions of a document
    Diff(diff::DiffArgs),
}

/// Input file options shared by every subcommand
#[derive(Args, Clone, Debug)]
pub struct InputArgs {
    /// Document to read
    pub path: PathBuf,

    /// Format hint (markdown, html, generic); detected from the file name when omitted
    #[arg(long)]
    pub format: Option<FormatHint>,
}

/// Load `.env` and configuration, then install logging
pub(crate) fn bootstrap() -> AppConfig {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging);

    config
}

/// Read the input file; an explicit format overrides the detected one
pub(crate) async fn read_input(input: &InputArgs) -> anyhow::Result<ReadOutput> {
    let output = FileReader::new().read(input.path.as_path()).await?;

    Ok(match input.format {
        Some(hint) => ReadOutput {
            format_hint: hint,
            ..output
        },
        None => output,
    })
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
