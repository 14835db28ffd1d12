use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// Row layout of the packet list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Density {
    Compact,
    Expanded,
}

impl Density {
    pub fn toggled(self) -> Self {
        match self {
            Density::Compact => Density::Expanded,
            Density::Expanded => Density::Compact,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Density::Compact => "Compact",
            Density::Expanded => "Expanded",
        }
    }
}

/// Interactive view state.
///
/// Written only by the input boundary, read by the refresh loop. Lives behind
/// [`SharedState`]; writers hold the lock only for the field update.
#[derive(Debug, Clone, Serialize)]
pub struct AppState {
    /// Index into `PROTOCOL_FILTERS`
    pub filter_index: usize,

    /// Endpoint search text, empty when not searching
    pub search: String,

    pub density: Density,

    /// Whether keystrokes currently edit the search text
    pub search_mode: bool,

    /// Failures from the last filter change, shown until the next one
    pub status: Option<String>,
}

impl AppState {
    pub fn new(filter_index: usize) -> Self {
        Self {
            filter_index,
            search: String::new(),
            density: Density::Compact,
            search_mode: false,
            status: None,
        }
    }
}

pub type SharedState = Arc<RwLock<AppState>>;
