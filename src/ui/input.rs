use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::{debug, error, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::capture::manager::{apply_filter, failure_summary};
use crate::capture::source::SharedHandle;
use crate::models::filter::PROTOCOL_FILTERS;
use crate::models::state::{AppState, SharedState};
use crate::utils::signal::StopSignal;

/// How long one poll for terminal events may block
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What the caller must do after a key changed (or did not change) the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Ignore,
    Redraw,
    /// The filter index changed; capture handles need the new expression
    ChangeFilter(usize),
    Quit,
}

fn is_search_char(c: char) -> bool {
    c.is_ascii_hexdigit() || c == '.' || c == ':'
}

/// Apply one key press to the view state.
pub fn handle_key(state: &mut AppState, key: KeyEvent) -> InputAction {
    if key.kind != KeyEventKind::Press {
        return InputAction::Ignore;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return InputAction::Quit;
    }

    if state.search_mode {
        return match key.code {
            KeyCode::Esc => {
                state.search_mode = false;
                state.search.clear();
                InputAction::Redraw
            }
            KeyCode::Enter => {
                state.search_mode = false;
                InputAction::Redraw
            }
            KeyCode::Backspace => {
                state.search.pop();
                InputAction::Redraw
            }
            KeyCode::Char(c) if is_search_char(c) => {
                state.search.push(c);
                InputAction::Redraw
            }
            _ => InputAction::Ignore,
        };
    }

    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => InputAction::Quit,
        KeyCode::Enter | KeyCode::Char('/') => {
            state.search_mode = true;
            InputAction::Redraw
        }
        KeyCode::Char('m') | KeyCode::Char('M') => {
            state.density = state.density.toggled();
            InputAction::Redraw
        }
        KeyCode::Char(c @ '1'..='8') => {
            let index = (c as u8 - b'1') as usize;
            if index >= PROTOCOL_FILTERS.len() || index == state.filter_index {
                return InputAction::Ignore;
            }
            state.filter_index = index;
            InputAction::ChangeFilter(index)
        }
        _ => InputAction::Ignore,
    }
}

/// Push filter `index` to every handle and leave any per-interface failure
/// in the view state's status, where the next frame shows it.
pub fn change_filter(handles: &[SharedHandle], state: &SharedState, index: usize) {
    let status = match apply_filter(handles, index) {
        Ok(outcomes) => failure_summary(&outcomes),
        Err(e) => {
            warn!("Filter change ignored: {}", e);
            Some(e.to_string())
        }
    };
    state.write().status = status;
}

/// Blocking key loop: reads terminal events until a quit key or the stop
/// signal.
///
/// The state lock is held only while a key is applied; filter changes are
/// pushed to the capture handles afterwards, one interface at a time.
pub fn run_input_loop(
    handles: Vec<SharedHandle>,
    state: SharedState,
    stop: StopSignal,
    redraw: Arc<Notify>,
) {
    while !stop.is_triggered() {
        let ready = match event::poll(POLL_INTERVAL) {
            Ok(ready) => ready,
            Err(e) => {
                error!("Failed to poll terminal input: {}", e);
                stop.trigger();
                break;
            }
        };
        if !ready {
            continue;
        }

        let key = match event::read() {
            Ok(Event::Key(key)) => key,
            Ok(Event::Resize(..)) => {
                redraw.notify_one();
                continue;
            }
            Ok(_) => continue,
            Err(e) => {
                error!("Failed to read terminal input: {}", e);
                stop.trigger();
                break;
            }
        };

        let action = handle_key(&mut state.write(), key);
        match action {
            InputAction::Quit => {
                debug!("Quit requested from keyboard");
                stop.trigger();
            }
            InputAction::ChangeFilter(index) => {
                change_filter(&handles, &state, index);
                redraw.notify_one();
            }
            InputAction::Redraw => redraw.notify_one(),
            InputAction::Ignore => {}
        }
    }

    debug!("Input loop stopped");
}
