//! Diff command - previews what reindexing a new version of a document would do
//!
//! The old version is indexed into in-memory stores, then the new version is reindexed
//! against it. Nothing is persisted.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde::Serialize;

use super::{InputArgs, bootstrap, print_json, read_input};
use crate::domain::indexing::IndexResult;
use crate::infrastructure::indexing::{HashEmbedder, InMemoryIndexStore, InMemoryStateStore};
use crate::infrastructure::services::DocumentPipeline;

const PREVIEW_DOC_ID: &str = "preview";

/// Arguments for the diff command
#[derive(Args, Clone, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub old: InputArgs,

    /// New version of the document
    pub new_path: PathBuf,
}

#[derive(Debug, Serialize)]
struct DiffReport {
    old: IndexResult,
    new: IndexResult,
}

/// Run the diff command
pub async fn run(args: DiffArgs) -> anyhow::Result<()> {
    let config = bootstrap();

    let pipeline = DocumentPipeline::from_config(
        &config.pipeline,
        Arc::new(HashEmbedder::default()),
        Arc::new(InMemoryIndexStore::new()),
        Arc::new(InMemoryStateStore::new()),
    )?;

    let new_input = InputArgs {
        path: args.new_path.clone(),
        format: args.old.format,
    };
    let old_document = read_input(&args.old).await?;
    let new_document = read_input(&new_input).await?;

    let old = pipeline
        .ingest(
            PREVIEW_DOC_ID,
            old_document.text.as_bytes(),
            old_document.format_hint,
            BTreeMap::new(),
        )
        .await?;
    let new = pipeline
        .ingest(
            PREVIEW_DOC_ID,
            new_document.text.as_bytes(),
            new_document.format_hint,
            BTreeMap::new(),
        )
        .await?;

    print_json(&DiffReport { old, new })
}
