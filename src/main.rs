mod capture;
mod models;
mod ui;
mod utils;
mod view;

use anyhow::Result;
use clap::Parser;
use log::{debug, info, warn, LevelFilter};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;

use crate::capture::manager::{failure_summary, CaptureManager};
use crate::capture::selector::{discover_interfaces, resolve_interfaces};
use crate::models::config::AppConfig;
use crate::models::filter::find_filter;
use crate::models::state::{AppState, SharedState};
use crate::ui::input::run_input_loop;
use crate::ui::terminal::TerminalSurface;
use crate::utils::error::AppResult;
use crate::utils::logging;
use crate::utils::signal::StopSignal;
use crate::view::refresh::{run_refresh, RefreshContext};

#[derive(Parser, Debug)]
#[clap(author, version, about = "A live multi-interface network traffic monitor for the terminal")]
struct Args {
    /// Network interface to capture from (repeatable; default: auto-select)
    #[clap(short, long)]
    interface: Vec<String>,

    /// Initial filter: ALL, HTTPS, HTTP, DNS, TCP, UDP, QUIC, ICMP or its number
    #[clap(short, long, default_value = "ALL")]
    filter: String,

    /// Packet history size
    #[clap(long, default_value = "50000")]
    buffer_size: usize,

    /// Capacity of the queue between capture workers and the aggregator
    #[clap(long, default_value = "1000")]
    queue_size: usize,

    /// Display refresh interval in milliseconds
    #[clap(long, default_value = "100")]
    refresh_ms: u64,

    /// Maximum number of packets considered per refresh
    #[clap(long, default_value = "10000")]
    max_display: usize,

    /// Capture snap length in bytes
    #[clap(long, default_value = "65535")]
    snaplen: i32,

    /// Disable promiscuous mode
    #[clap(long)]
    no_promiscuous: bool,

    /// Capture read timeout in milliseconds
    #[clap(long, default_value = "100")]
    read_timeout_ms: i32,

    /// List network interfaces and exit
    #[clap(long)]
    list_interfaces: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[clap(long, default_value = "info")]
    log_level: String,

    /// Append logs to this file. Without it only errors reach stderr while
    /// the packet list is on screen
    #[clap(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn to_config(&self) -> AppResult<AppConfig> {
        let config = AppConfig {
            interfaces: self.interface.clone(),
            filter_index: find_filter(&self.filter)?,
            buffer_size: self.buffer_size,
            queue_size: self.queue_size,
            refresh_ms: self.refresh_ms,
            max_display: self.max_display,
            snaplen: self.snaplen,
            promiscuous: !self.no_promiscuous,
            read_timeout_ms: self.read_timeout_ms,
            log_file: self.log_file.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Effective log level. Stderr shares the terminal with the packet list,
    /// so it only carries errors unless output goes to a file or no list is
    /// drawn.
    fn log_level(&self) -> LevelFilter {
        let level = logging::get_log_level(&self.log_level);
        if self.log_file.is_none() && !self.list_interfaces {
            level.min(LevelFilter::Error)
        } else {
            level
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    logging::init_logger(args.log_level(), args.log_file.as_deref())?;

    info!("Starting netmon v{}", env!("CARGO_PKG_VERSION"));

    #[cfg(target_os = "windows")]
    warn_if_not_elevated();

    let all = discover_interfaces()?;

    if args.list_interfaces {
        let selected = resolve_interfaces(&all, &args.interface)?;
        for iface in &all {
            let marker = if selected.iter().any(|s| s.name == iface.name) { "*" } else { " " };
            println!("{} {}", marker, iface.formatted_display());
        }
        println!("(* = selected for capture)");
        return Ok(());
    }

    let config = args.to_config()?;
    debug!("Configuration: {}", serde_json::to_string(&config)?);

    let selected = resolve_interfaces(&all, &config.interfaces)?;
    info!(
        "Selected interfaces: {}",
        selected
            .iter()
            .map(|i| i.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let stop = StopSignal::new();
    let mut manager = CaptureManager::new(config.clone(), stop.clone());
    let outcomes = manager.open_interfaces(&selected)?;
    manager.start()?;

    let surface = match TerminalSurface::new() {
        Ok(surface) => surface,
        Err(e) => {
            manager.shutdown().await;
            return Err(e.into());
        }
    };

    let mut initial = AppState::new(config.filter_index);
    initial.status = failure_summary(&outcomes);
    let state: SharedState = Arc::new(RwLock::new(initial));
    let redraw = Arc::new(Notify::new());

    let context = RefreshContext {
        buffer: manager.buffer(),
        state: state.clone(),
        stats: manager.stats(),
        interfaces: manager.interface_names(),
        max_display: config.max_display,
    };
    manager.spawn(run_refresh(
        surface,
        context,
        config.refresh_interval(),
        redraw.clone(),
        stop.clone(),
    ));

    let handles = manager.handles().to_vec();
    let input_stop = stop.clone();
    manager.spawn_blocking(move || run_input_loop(handles, state, input_stop, redraw));

    tokio::select! {
        _ = stop.triggered() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
        }
    }

    manager.shutdown().await;
    info!("netmon stopped");
    Ok(())
}

/// Capture on Windows needs administrator rights; say so up front.
#[cfg(target_os = "windows")]
fn warn_if_not_elevated() {
    use std::process::Command;

    let is_admin = Command::new("powershell")
        .args(&[
            "-Command",
            "[bool](([System.Security.Principal.WindowsIdentity]::GetCurrent()).groups -match 'S-1-5-32-544')",
        ])
        .output()
        .map(|output| String::from_utf8_lossy(&output.stdout).trim() == "True")
        .unwrap_or(false);

    if !is_admin {
        warn!("netmon is not running with administrator privileges on Windows.");
        warn!("Opening capture handles will likely fail.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_map_to_default_config() {
        let args = Args::try_parse_from(["netmon"]).unwrap();
        let config = args.to_config().unwrap();
        let defaults = AppConfig::default();

        assert!(config.interfaces.is_empty());
        assert_eq!(config.filter_index, 0);
        assert_eq!(config.buffer_size, defaults.buffer_size);
        assert_eq!(config.queue_size, defaults.queue_size);
        assert_eq!(config.refresh_ms, defaults.refresh_ms);
        assert_eq!(config.max_display, defaults.max_display);
        assert!(config.promiscuous);
    }

    #[test]
    fn test_repeated_interfaces_and_filter() {
        let args = Args::try_parse_from([
            "netmon", "-i", "eth0", "-i", "wlan0", "--filter", "dns", "--no-promiscuous",
        ])
        .unwrap();
        let config = args.to_config().unwrap();
        assert_eq!(config.interfaces, vec!["eth0".to_string(), "wlan0".to_string()]);
        assert_eq!(config.filter_index, 3);
        assert!(!config.promiscuous);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let args = Args::try_parse_from(["netmon", "--filter", "gopher"]).unwrap();
        assert!(args.to_config().is_err());

        let args = Args::try_parse_from(["netmon", "--buffer-size", "0"]).unwrap();
        assert!(args.to_config().is_err());
    }

    #[test]
    fn test_stderr_logging_is_quiet_during_capture() {
        let args = Args::try_parse_from(["netmon", "--log-level", "debug"]).unwrap();
        assert_eq!(args.log_level(), LevelFilter::Error);

        let args = Args::try_parse_from(["netmon", "--log-level", "debug", "--log-file", "netmon.log"]).unwrap();
        assert_eq!(args.log_level(), LevelFilter::Debug);
    }
}
