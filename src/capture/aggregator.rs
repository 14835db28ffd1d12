use log::{debug, info};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::capture::buffer::SharedBuffer;
use crate::models::packet::PacketRecord;
use crate::models::stats::CaptureStats;
use crate::utils::signal::StopSignal;

/// Records appended per write-lock acquisition at most
const MAX_BATCH: usize = 256;

/// Single consumer of the inbound queue.
///
/// Appends records to the retention buffer in arrival order until the stop
/// signal fires or every sender is gone. Whatever is already queued is
/// appended under the same write lock as the record that woke the task.
pub async fn run_aggregator(
    mut inbound: mpsc::Receiver<PacketRecord>,
    buffer: SharedBuffer,
    stop: StopSignal,
    stats: Arc<CaptureStats>,
) {
    info!("Aggregator started");

    loop {
        let first = tokio::select! {
            biased;
            _ = stop.triggered() => break,
            next = inbound.recv() => match next {
                Some(record) => record,
                None => {
                    debug!("All capture workers have exited");
                    break;
                }
            },
        };

        let mut history = buffer.write();
        stats.record_appended(history.push(first));

        for _ in 1..MAX_BATCH {
            match inbound.try_recv() {
                Ok(record) => stats.record_appended(history.push(record)),
                Err(_) => break,
            }
        }
    }

    info!("Aggregator stopped");
}
