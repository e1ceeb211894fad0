use clap::Parser;
use pmp_chunk_indexer::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Chunk(args) => cli::chunk::run(args).await,
        Command::Analyze(args) => cli::analyze::run(args).await,
        Command::Large(args) => cli::large::run(args).await,
        Command::Index(args) => cli::index::run(args).await,
        Command::Diff(args) => cli::diff::run(args).await,
    }
}
