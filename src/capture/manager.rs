use log::{error, info, warn};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::capture::aggregator::run_aggregator;
use crate::capture::buffer::{RetentionBuffer, SharedBuffer};
use crate::capture::source::{CaptureHandle, FrameSource, OpenOptions, PcapSource, SharedHandle};
use crate::capture::worker::run_worker;
use crate::models::config::AppConfig;
use crate::models::filter::filter_at;
use crate::models::interface::InterfaceInfo;
use crate::models::stats::CaptureStats;
use crate::utils::error::{AppError, AppResult};
use crate::utils::signal::StopSignal;

/// Result of re-applying a filter expression on one interface
#[derive(Debug)]
pub struct FilterOutcome {
    pub interface: String,
    pub result: AppResult<()>,
}

/// Swap the capture expression of every open handle to that of
/// `filter_index`.
///
/// Handles are updated one at a time. A failure on one interface is reported
/// in its outcome and leaves that interface on its previous expression; the
/// remaining interfaces are still updated. Workers keep running throughout.
pub fn apply_filter(handles: &[SharedHandle], filter_index: usize) -> AppResult<Vec<FilterOutcome>> {
    let filter = filter_at(filter_index)
        .ok_or_else(|| AppError::InvalidFilter(format!("index {}", filter_index)))?;

    let outcomes = handles
        .iter()
        .map(|handle| {
            let result = handle.set_filter(filter.expression);
            match &result {
                Ok(()) => info!(
                    "Applied filter {} ({}) on {}",
                    filter.label,
                    filter.expression,
                    handle.interface()
                ),
                Err(e) => warn!("Failed to change filter on {}: {}", handle.interface(), e),
            }
            FilterOutcome {
                interface: handle.interface().to_string(),
                result,
            }
        })
        .collect();

    Ok(outcomes)
}

/// One-line description of every interface that rejected a filter, or
/// `None` when all of them took it
pub fn failure_summary(outcomes: &[FilterOutcome]) -> Option<String> {
    let failed: Vec<String> = outcomes
        .iter()
        .filter_map(|outcome| outcome.result.as_ref().err().map(|e| e.to_string()))
        .collect();

    if failed.is_empty() {
        None
    } else {
        Some(failed.join("; "))
    }
}

fn open_pcap(interface: &str, options: OpenOptions) -> AppResult<Box<dyn FrameSource>> {
    let source = PcapSource::open(interface, options)?;
    Ok(Box::new(source))
}

/// Owns the capture pipeline: the open handles, the retention buffer and
/// every concurrent unit working on them.
pub struct CaptureManager {
    /// Application configuration
    config: AppConfig,

    /// Open capture handles, one per interface
    handles: Vec<SharedHandle>,

    /// Retention buffer shared with the refresh path
    buffer: SharedBuffer,

    /// Pipeline counters
    stats: Arc<CaptureStats>,

    /// Stop signal observed by every unit
    stop: StopSignal,

    /// Workers, aggregator and any other unit joined on shutdown
    tasks: JoinSet<()>,

    /// Flag indicating if capture is running
    running: bool,
}

impl CaptureManager {
    /// Create a new capture manager
    pub fn new(config: AppConfig, stop: StopSignal) -> Self {
        let buffer = RetentionBuffer::shared(config.buffer_size);
        Self {
            config,
            handles: Vec::new(),
            buffer,
            stats: Arc::new(CaptureStats::default()),
            stop,
            tasks: JoinSet::new(),
            running: false,
        }
    }

    /// Open a live capture on each interface.
    ///
    /// An interface that cannot be opened is logged and left out. Fails only
    /// when no interface could be opened at all. The configured initial
    /// filter is applied to every handle that opened; the per-interface
    /// outcomes are returned.
    pub fn open_interfaces(&mut self, interfaces: &[InterfaceInfo]) -> AppResult<Vec<FilterOutcome>> {
        self.open_interfaces_with(interfaces, open_pcap)
    }

    /// [`open_interfaces`](Self::open_interfaces) with the provider's open
    /// call supplied by the caller
    pub fn open_interfaces_with<F>(&mut self, interfaces: &[InterfaceInfo], open: F) -> AppResult<Vec<FilterOutcome>>
    where
        F: Fn(&str, OpenOptions) -> AppResult<Box<dyn FrameSource>>,
    {
        let options = OpenOptions {
            snaplen: self.config.snaplen,
            promiscuous: self.config.promiscuous,
            read_timeout_ms: self.config.read_timeout_ms,
        };

        for iface in interfaces {
            match open(&iface.name, options) {
                Ok(source) => {
                    info!("Successfully opened capture on {}", iface.name);
                    self.add_source(&iface.name, source);
                }
                Err(e) => error!("Excluding interface {}: {}", iface.name, e),
            }
        }

        if self.handles.is_empty() {
            return Err(AppError::NoUsableInterfaces);
        }

        apply_filter(&self.handles, self.config.filter_index)
    }

    /// Register an already-open frame source for `interface`
    pub fn add_source(&mut self, interface: &str, source: Box<dyn FrameSource>) -> SharedHandle {
        let handle = CaptureHandle::new(interface, source);
        self.handles.push(handle.clone());
        handle
    }

    /// Spawn the aggregator and one capture worker per handle
    pub fn start(&mut self) -> AppResult<()> {
        if self.running {
            return Err(AppError::Capture("Capture is already running".into()));
        }
        if self.handles.is_empty() {
            return Err(AppError::NoUsableInterfaces);
        }

        let (tx, rx) = mpsc::channel(self.config.queue_size);

        self.tasks.spawn(run_aggregator(
            rx,
            self.buffer.clone(),
            self.stop.clone(),
            self.stats.clone(),
        ));

        for handle in &self.handles {
            let handle = handle.clone();
            let tx = tx.clone();
            let stop = self.stop.clone();
            let stats = self.stats.clone();
            self.tasks.spawn_blocking(move || {
                run_worker(handle, tx, stop, stats);
            });
        }

        self.running = true;
        info!(
            "Capture started on {} interface(s): {}",
            self.handles.len(),
            self.interface_names().join(", ")
        );
        Ok(())
    }

    /// Track an additional async unit so shutdown waits for it
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Track an additional blocking unit so shutdown waits for it
    pub fn spawn_blocking<F>(&mut self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.tasks.spawn_blocking(task);
    }

    pub fn handles(&self) -> &[SharedHandle] {
        &self.handles
    }

    pub fn interface_names(&self) -> Vec<String> {
        self.handles.iter().map(|h| h.interface().to_string()).collect()
    }

    pub fn buffer(&self) -> SharedBuffer {
        self.buffer.clone()
    }

    pub fn stats(&self) -> Arc<CaptureStats> {
        self.stats.clone()
    }

    /// Trigger the stop signal, wait for every unit to finish, then close the
    /// capture handles.
    pub async fn shutdown(mut self) {
        info!("Stopping packet capture");
        self.stop.trigger();

        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                error!("Capture task ended abnormally: {}", e);
            }
        }

        let stats = self.stats.snapshot();
        info!(
            "Capture stopped: {} received, {} dropped, {} retained",
            stats.received,
            stats.dropped,
            self.buffer.read().len()
        );

        // Last references: dropping closes the underlying captures.
        self.handles.clear();
    }
}
