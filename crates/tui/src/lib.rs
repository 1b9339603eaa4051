//! Terminal inspector for patched methods.
//!
//! A two-pane ratatui view: patched methods on the left, the selected
//! method's layered diff plus its patch list on the right. Toggling a patch
//! rebuilds the diff from scratch; decompilation runs in the background on
//! the tokio runtime and lands in a shared slot consumed by the next frame.

pub mod api;
pub mod app;
pub mod decompile;
pub mod event;
pub mod ui;

use app::App;
use color_eyre::eyre::Result;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use hooklens_core::runtime::{Decompiler, DetourRuntime, Disassembler};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::sync::Arc;

/// Runs the inspector until the user quits. Takes over the terminal; raw
/// mode and the alternate screen are restored on the way out even when the
/// event loop errors.
pub fn run(
    runtime: Arc<dyn DetourRuntime>,
    disasm: Arc<dyn Disassembler>,
    decompiler: Arc<dyn Decompiler>,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let app = App::new(runtime, disasm, decompiler);
    let res = event::run_event_loop(&mut terminal, app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}
