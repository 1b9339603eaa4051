//! Bulk-exports every patched method of a session.

use async_trait::async_trait;
use clap::Args;
use hooklens_core::session::Session;
use hooklens_engine::export::{self, HostInfo, ModVersion};
use std::error::Error;
use std::path::PathBuf;

/// Arguments for the `dump` subcommand.
#[derive(Args)]
pub struct DumpArgs {
    /// Path to the recorded session file.
    pub session: PathBuf,
    /// Directory to write the export tree into.
    pub out_dir: PathBuf,
}

#[async_trait]
impl super::Command for DumpArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        let session = Session::load(&self.session)?;
        let registry = session.registry()?;

        let host = HostInfo {
            version: session.host_version.clone(),
            mods: session
                .mods
                .iter()
                .map(|m| ModVersion {
                    name: m.name.clone(),
                    version: m.version.clone(),
                })
                .collect(),
        };

        let index = export::dump_all(&registry, &registry, &self.out_dir, &host)?;
        println!(
            "Exported {} methods to {}",
            index.methods.len(),
            self.out_dir.display()
        );
        Ok(())
    }
}
