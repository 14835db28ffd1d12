use log::{debug, error};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{self, MissedTickBehavior};

use crate::capture::buffer::SharedBuffer;
use crate::models::state::SharedState;
use crate::models::stats::CaptureStats;
use crate::utils::error::AppResult;
use crate::utils::signal::StopSignal;
use crate::view::render::{render_entry, DisplayFrame};
use crate::view::select::select;

/// Anything that can draw a [`DisplayFrame`]
pub trait DisplaySurface: Send {
    fn render(&mut self, frame: &DisplayFrame) -> AppResult<()>;

    /// How many entries the surface can show right now; `None` for no limit
    fn visible_entries(&self) -> Option<usize> {
        None
    }
}

/// Read-only handles the refresh path needs to build a frame
#[derive(Clone)]
pub struct RefreshContext {
    pub buffer: SharedBuffer,
    pub state: SharedState,
    pub stats: Arc<CaptureStats>,
    pub interfaces: Vec<String>,
    pub max_display: usize,
}

impl RefreshContext {
    /// Snapshot the view state, then select and render at most `visible`
    /// entries under the buffer's read lock. Neither lock is held while the
    /// surface draws.
    pub fn build_frame(&self, visible: Option<usize>) -> DisplayFrame {
        let state = self.state.read().clone();
        let limit = visible.map_or(self.max_display, |rows| rows.min(self.max_display));

        let (entries, retained) = {
            let history = self.buffer.read();
            let entries = select(&history, state.filter_index, &state.search, limit)
                .into_iter()
                .map(|record| render_entry(record, state.density, &state.search))
                .collect();
            (entries, history.len())
        };

        DisplayFrame::new(
            entries,
            &state,
            retained,
            self.stats.snapshot(),
            self.interfaces.clone(),
        )
    }
}

/// Redraw on every tick and whenever `trigger` is notified, until stopped.
///
/// A surface that fails to draw cannot show anything more, so a render error
/// triggers the stop signal.
pub async fn run_refresh<S: DisplaySurface>(
    mut surface: S,
    context: RefreshContext,
    interval: Duration,
    trigger: Arc<Notify>,
    stop: StopSignal,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = stop.triggered() => break,
            _ = ticker.tick() => {}
            _ = trigger.notified() => {}
        }

        let frame = context.build_frame(surface.visible_entries());
        if let Err(e) = surface.render(&frame) {
            error!("Display refresh failed: {}", e);
            stop.trigger();
            break;
        }
    }

    debug!("Refresh loop stopped");
}
