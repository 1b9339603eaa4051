use clap::Parser;
use hooklens_cli::commands::{Cmd, Command};

/// Hooklens CLI
///
/// Hooklens diffs the bytecode of patched methods against the rewrite hooks
/// registered on them, attributing every inserted or removed instruction to
/// the responsible patch. Sessions recorded by a host process can be diffed
/// on the console, bulk-exported to disk, or browsed in a TUI inspector.
#[derive(Parser)]
#[command(name = "hooklens")]
#[command(about = "Hooklens: method patch diff inspector")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

/// Runs the Hooklens CLI with the provided arguments.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .without_time()
        .init();

    let cli = Cli::parse();
    cli.command.execute().await
}
