//! Event handling for keyboard and mouse input.

use crate::app::App;
use crate::ui::ui;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, MouseButton, MouseEventKind};
use std::io;

/// Handle keyboard events. Returns true if the application should quit.
pub fn handle_key_event(app: &mut App, key: crossterm::event::KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Esc => {
            // Esc closes the decompile view first, then quits.
            if app.show_decompile {
                app.close_decompile();
            } else {
                return true;
            }
        }
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Char('n') => app.patch_cursor_next(),
        KeyCode::Char('p') => app.patch_cursor_prev(),
        KeyCode::Char('t') => app.toggle_current_patch(),
        KeyCode::Char('d') => app.request_decompile(),
        KeyCode::Char('r') => app.refresh(),
        KeyCode::PageDown => {
            for _ in 0..10 {
                app.scroll_down();
            }
        }
        KeyCode::PageUp => {
            for _ in 0..10 {
                app.scroll_up();
            }
        }
        KeyCode::Char('J') => app.scroll_down(),
        KeyCode::Char('K') => app.scroll_up(),
        KeyCode::Home | KeyCode::Char('g') => app.detail_scroll = 0,
        _ => {}
    }

    false
}

/// Handle mouse events.
pub fn handle_mouse_event(app: &mut App, mouse: crossterm::event::MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if is_in_list_area(app, x, y) {
                let relative_y = y.saturating_sub(app.list_area.y + 1);
                let clicked_idx = relative_y as usize + app.list_state.offset();
                app.select_index(clicked_idx);
            }
        }
        MouseEventKind::ScrollUp => {
            if is_in_detail_area(app, x, y) {
                app.scroll_up();
            } else if is_in_list_area(app, x, y) {
                app.select_prev();
            }
        }
        MouseEventKind::ScrollDown => {
            if is_in_detail_area(app, x, y) {
                app.scroll_down();
            } else if is_in_list_area(app, x, y) {
                app.select_next();
            }
        }
        _ => {}
    }
}

const fn is_in_detail_area(app: &App, x: u16, y: u16) -> bool {
    x >= app.detail_area.x
        && x < app.detail_area.x + app.detail_area.width
        && y >= app.detail_area.y
        && y < app.detail_area.y + app.detail_area.height
}

const fn is_in_list_area(app: &App, x: u16, y: u16) -> bool {
    x >= app.list_area.x
        && x < app.list_area.x + app.list_area.width
        && y >= app.list_area.y
        && y < app.list_area.y + app.list_area.height
}

/// Run the main event loop. Returns when the user quits.
pub fn run_event_loop<B: ratatui::backend::Backend>(
    terminal: &mut ratatui::Terminal<B>,
    mut app: App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, &mut app))?;

        // Poll so background decompile results show up without a keypress.
        if !event::poll(std::time::Duration::from_millis(100))? {
            continue;
        }

        match event::read()? {
            Event::Key(key) => {
                if handle_key_event(&mut app, key) {
                    return Ok(());
                }
            }
            Event::Mouse(mouse) => handle_mouse_event(&mut app, mouse),
            _ => {}
        }
    }
}
