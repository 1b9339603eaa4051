//! Diffs one method from a recorded session and prints the result with the
//! usual diff coloring.

use async_trait::async_trait;
use clap::Args;
use hooklens_core::session::Session;
use hooklens_engine::{MethodDiff, render};
use std::error::Error;
use std::path::PathBuf;

/// Arguments for the `diff` subcommand.
#[derive(Args)]
pub struct DiffArgs {
    /// Path to the recorded session file.
    pub session: PathBuf,
    /// Full name of the declaring type.
    pub type_name: String,
    /// Method name.
    pub method_name: String,
}

#[async_trait]
impl super::Command for DiffArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        let session = Session::load(&self.session)?;
        let registry = session.registry()?;

        // An unknown or ambiguous name degrades to a message, never a panic.
        let method = match registry.find_method(&self.type_name, &self.method_name) {
            Ok(method) => method,
            Err(e) => {
                tracing::warn!(
                    type_name = self.type_name,
                    method_name = self.method_name,
                    error = %e,
                    "method lookup failed"
                );
                println!("No diff available: {e}");
                return Ok(());
            }
        };

        let diff = MethodDiff::build(&registry, &registry, &method)?;
        render::print_diff(&diff);
        Ok(())
    }
}
