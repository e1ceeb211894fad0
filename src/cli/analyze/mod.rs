//! Analyze command - prints features, chosen parameters and reference ranking

use clap::Args;

use super::{InputArgs, bootstrap, print_json, read_input};
use crate::infrastructure::services::DocumentChunker;

/// Arguments for the analyze command
#[derive(Args, Clone, Debug)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

/// Run the analyze command
pub async fn run(args: AnalyzeArgs) -> anyhow::Result<()> {
    let config = bootstrap();
    let chunker = DocumentChunker::from_config(&config.pipeline)?;

    let document = read_input(&args.input).await?;
    let analysis = chunker.analyze(&document.text, document.format_hint, None);

    print_json(&analysis)
}
