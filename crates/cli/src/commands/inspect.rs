//! Launches the TUI inspector for a recorded session.

use async_trait::async_trait;
use clap::Args;
use hooklens_core::session::Session;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

/// Arguments for the `inspect` subcommand.
#[derive(Args)]
pub struct InspectArgs {
    /// Path to the recorded session file.
    pub session: PathBuf,
}

#[async_trait]
impl super::Command for InspectArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        let session = Session::load(&self.session)?;
        let registry = Arc::new(session.registry()?);

        // The TUI blocks on terminal events; keep the runtime available for
        // the background decompile tasks it spawns.
        tokio::task::block_in_place(|| {
            hooklens_tui::run(registry.clone(), registry.clone(), registry)
        })?;
        Ok(())
    }
}
