use log::{error, info, trace};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::capture::classifier::build_record;
use crate::capture::source::{ReadOutcome, SharedHandle};
use crate::models::packet::{PacketRecord, Protocol};
use crate::models::stats::CaptureStats;
use crate::utils::signal::StopSignal;

const MAX_CONSECUTIVE_ERRORS: u32 = 5;
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Why a capture worker returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The stop signal was triggered
    Stopped,
    /// The provider's frame stream ended
    SourceClosed,
    /// The aggregator is gone
    QueueClosed,
    /// Too many consecutive read errors
    Failed,
}

/// Capture loop for one interface.
///
/// Blocking: meant for `spawn_blocking`. Reads frames until the stop signal
/// fires or the stream ends, turning each frame into a [`PacketRecord`] and
/// forwarding it without ever waiting on the queue. When the queue is full the
/// record is dropped and counted.
pub fn run_worker(
    handle: SharedHandle,
    outbound: mpsc::Sender<PacketRecord>,
    stop: StopSignal,
    stats: Arc<CaptureStats>,
) -> WorkerExit {
    let interface = handle.interface().to_string();
    info!("Starting capture loop for interface: {}", interface);

    let mut consecutive_errors = 0;

    let exit = loop {
        if stop.is_triggered() {
            break WorkerExit::Stopped;
        }

        match handle.read_next() {
            Ok(ReadOutcome::Frame(frame)) => {
                consecutive_errors = 0;
                stats.record_received();

                let record = build_record(&interface, &frame);
                if record.protocol == Protocol::Pkt {
                    stats.record_unclassified();
                }

                match outbound.try_send(record) {
                    Ok(()) => trace!("Forwarded {} byte frame from {}", frame.data.len(), interface),
                    Err(TrySendError::Full(_)) => stats.record_dropped(),
                    Err(TrySendError::Closed(_)) => break WorkerExit::QueueClosed,
                }
            }
            Ok(ReadOutcome::Timeout) => {
                trace!("Read on {} timed out, continuing", interface);
            }
            Ok(ReadOutcome::Closed) => break WorkerExit::SourceClosed,
            Err(e) => {
                error!("Error capturing packet on {}: {}", interface, e);
                consecutive_errors += 1;

                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    error!(
                        "Too many consecutive errors ({}) on {}, stopping capture",
                        consecutive_errors, interface
                    );
                    break WorkerExit::Failed;
                }

                std::thread::sleep(ERROR_BACKOFF);
            }
        }
    };

    info!("Capture loop stopped for interface: {} ({:?})", interface, exit);
    exit
}
