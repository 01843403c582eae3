//! Keyboard input handling for the TUI.
//!
//! Keys are translated into the same action tags the cart dispatcher
//! understands, so every cart change goes through one path.

use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{App, AppState, View};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    // Help overlay swallows everything until dismissed
    if matches!(app.state, AppState::ShowingHelp) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            app.state = AppState::Browsing;
        }
        return false;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            app.state = AppState::Quitting;
            return true;
        }
        KeyCode::Char('?') if matches!(app.state, AppState::Browsing) => {
            app.state = AppState::ShowingHelp;
            return false;
        }
        KeyCode::Char('r') if matches!(app.state, AppState::LoadFailed(_)) => {
            app.status_message = None;
            app.start_catalog_load();
            return false;
        }
        _ => {}
    }

    if !matches!(app.state, AppState::Browsing) {
        return false;
    }

    app.status_message = None;
    match key.code {
        KeyCode::Left => {
            if app.view == View::Products {
                app.prev_category();
            }
        }
        KeyCode::Right => {
            if app.view == View::Products {
                app.next_category();
            }
        }
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Char('c') | KeyCode::Tab => app.toggle_view(),
        KeyCode::Char('+') | KeyCode::Char('=') if app.view == View::Products => app.apply("inc"),
        KeyCode::Char('-') if app.view == View::Products => app.apply("dec"),
        KeyCode::Char('a') | KeyCode::Enter if app.view == View::Products => {
            app.apply("addToCart")
        }
        KeyCode::Char('d') | KeyCode::Delete if app.view == View::Cart => {
            app.apply("removeFromCart")
        }
        _ => {}
    }
    false
}
