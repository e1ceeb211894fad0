//! Index command - reindexes a document against state persisted on disk
//!
//! Index entries live in memory for the duration of the command; the document state is
//! written under `--state-dir`, so repeated runs report `unchanged`, `updated` or
//! `reprocessed` against the previous run.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use super::{InputArgs, bootstrap, print_json, read_input};
use crate::domain::ingestion::validate_document_id;
use crate::infrastructure::indexing::{FileStateStore, HashEmbedder, InMemoryIndexStore};
use crate::infrastructure::services::DocumentPipeline;

/// Arguments for the index command
#[derive(Args, Clone, Debug)]
pub struct IndexArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Document id; defaults to the file path
    #[arg(long)]
    pub doc_id: Option<String>,

    /// Directory holding document state
    #[arg(long, default_value = ".chunk-state")]
    pub state_dir: PathBuf,

    /// Extra entry metadata as key=value, repeatable
    #[arg(long = "meta", value_parser = parse_key_value)]
    pub metadata: Vec<(String, String)>,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

/// Run the index command
pub async fn run(args: IndexArgs) -> anyhow::Result<()> {
    let config = bootstrap();

    let doc_id = args
        .doc_id
        .clone()
        .unwrap_or_else(|| args.input.path.display().to_string());
    validate_document_id(&doc_id)?;

    tokio::fs::create_dir_all(&args.state_dir).await?;

    let pipeline = DocumentPipeline::from_config(
        &config.pipeline,
        Arc::new(HashEmbedder::default()),
        Arc::new(InMemoryIndexStore::new()),
        Arc::new(FileStateStore::new(args.state_dir.clone())),
    )?;

    let document = read_input(&args.input).await?;
    let metadata: BTreeMap<String, String> = args.metadata.iter().cloned().collect();

    let result = pipeline
        .ingest(
            &doc_id,
            document.text.as_bytes(),
            document.format_hint,
            metadata,
        )
        .await?;

    print_json(&result)
}
