use async_trait::async_trait;
use clap::Subcommand;
use std::error::Error;

pub mod diff;
pub mod dump;
pub mod inspect;

/// CLI subcommands for Hooklens.
#[derive(Subcommand)]
pub enum Cmd {
    /// Diff one method against its registered hooks.
    Diff(diff::DiffArgs),
    /// Export the diff of every patched method to a directory.
    Dump(dump::DumpArgs),
    /// Browse a session in the TUI inspector.
    Inspect(inspect::InspectArgs),
}

/// Trait for executing CLI subcommands.
#[async_trait]
pub trait Command {
    /// Executes the subcommand.
    async fn execute(self) -> Result<(), Box<dyn Error>>;
}

#[async_trait]
impl Command for Cmd {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        match self {
            Cmd::Diff(args) => args.execute().await,
            Cmd::Dump(args) => args.execute().await,
            Cmd::Inspect(args) => args.execute().await,
        }
    }
}
