use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info, warn};
use parking_lot::Mutex;
use pcap::{Active, Capture};
use std::sync::Arc;

use crate::utils::error::{AppError, AppResult};

/// Link-layer framing of the frames a handle delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Ethernet,
    /// Bare IPv4/IPv6 with no link header
    RawIp,
    /// BSD loopback: 4-byte address family header
    Null,
    /// Linux cooked capture (SLL), as delivered by the "any" device
    LinuxSll,
    Unknown(i32),
}

impl LinkKind {
    /// Map a libpcap DLT/LINKTYPE value
    pub fn from_dlt(dlt: i32) -> Self {
        match dlt {
            1 => LinkKind::Ethernet,
            0 | 108 => LinkKind::Null,
            12 | 14 | 101 | 228 | 229 => LinkKind::RawIp,
            113 => LinkKind::LinuxSll,
            other => LinkKind::Unknown(other),
        }
    }
}

/// One frame as read from a capture handle
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Vec<u8>,

    /// Capture timestamp, when the provider supplied one
    pub timestamp: Option<DateTime<Utc>>,

    pub link: LinkKind,
}

/// Result of one read attempt
#[derive(Debug)]
pub enum ReadOutcome {
    Frame(RawFrame),
    /// Nothing arrived within the provider's read timeout
    Timeout,
    /// The frame stream has ended
    Closed,
}

/// The capture provider seam.
///
/// A source is opened on one interface and closed when dropped. Reads block
/// for at most the provider's read timeout so callers can observe the stop
/// signal and let filter swaps in between reads.
pub trait FrameSource: Send {
    fn read_next(&mut self) -> AppResult<ReadOutcome>;

    fn set_filter(&mut self, expression: &str) -> AppResult<()>;
}

/// An open capture handle shared between its worker (reads) and the filter
/// reconfiguration path (filter swaps).
///
/// The mutex serialises the two; a swap waits for at most one read timeout.
pub struct CaptureHandle {
    interface: String,
    source: Mutex<Box<dyn FrameSource>>,
}

pub type SharedHandle = Arc<CaptureHandle>;

impl CaptureHandle {
    pub fn new(interface: impl Into<String>, source: Box<dyn FrameSource>) -> SharedHandle {
        Arc::new(Self {
            interface: interface.into(),
            source: Mutex::new(source),
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn read_next(&self) -> AppResult<ReadOutcome> {
        self.source.lock().read_next()
    }

    pub fn set_filter(&self, expression: &str) -> AppResult<()> {
        self.source.lock().set_filter(expression)
    }
}

/// Options used when opening a live capture
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    pub snaplen: i32,
    pub promiscuous: bool,
    pub read_timeout_ms: i32,
}

/// libpcap-backed frame source
pub struct PcapSource {
    interface: String,
    capture: Capture<Active>,
    link: LinkKind,
}

impl PcapSource {
    /// Open a live capture in immediate-delivery mode, falling back to a
    /// plain open when the platform rejects immediate mode.
    pub fn open(interface: &str, options: OpenOptions) -> AppResult<Self> {
        info!("Creating capture on interface: {}", interface);

        let capture = match Self::open_immediate(interface, options) {
            Ok(capture) => capture,
            Err(first) => {
                warn!(
                    "Immediate-mode open failed on {}: {}, retrying with a plain open",
                    interface, first
                );
                Self::open_plain(interface, options).map_err(|second| AppError::CaptureOpen {
                    interface: interface.to_string(),
                    reason: format!("open failed after immediate-mode attempt ({}): {}", first, second),
                })?
            }
        };

        let link = LinkKind::from_dlt(capture.get_datalink().0);
        debug!("Capture on {} delivers {:?} frames", interface, link);

        Ok(Self {
            interface: interface.to_string(),
            capture,
            link,
        })
    }

    fn open_immediate(interface: &str, options: OpenOptions) -> Result<Capture<Active>, pcap::Error> {
        Capture::from_device(interface)?
            .promisc(options.promiscuous)
            .snaplen(options.snaplen)
            .immediate_mode(true)
            .timeout(options.read_timeout_ms)
            .open()
    }

    fn open_plain(interface: &str, options: OpenOptions) -> Result<Capture<Active>, pcap::Error> {
        Capture::from_device(interface)?
            .promisc(options.promiscuous)
            .snaplen(options.snaplen)
            .timeout(options.read_timeout_ms)
            .open()
    }
}

impl FrameSource for PcapSource {
    fn read_next(&mut self) -> AppResult<ReadOutcome> {
        match self.capture.next_packet() {
            Ok(packet) => {
                let secs = packet.header.ts.tv_sec as i64;
                let micros = (packet.header.ts.tv_usec as i64).clamp(0, 999_999) as u32;
                let timestamp = if secs > 0 {
                    Utc.timestamp_opt(secs, micros * 1000).single()
                } else {
                    None
                };

                Ok(ReadOutcome::Frame(RawFrame {
                    data: packet.data.to_vec(),
                    timestamp,
                    link: self.link,
                }))
            }
            Err(pcap::Error::TimeoutExpired) => Ok(ReadOutcome::Timeout),
            Err(pcap::Error::NoMorePackets) => Ok(ReadOutcome::Closed),
            Err(e) => Err(AppError::Pcap(e)),
        }
    }

    fn set_filter(&mut self, expression: &str) -> AppResult<()> {
        self.capture
            .filter(expression, true)
            .map_err(|e| AppError::FilterApply {
                interface: self.interface.clone(),
                expression: expression.to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::ScriptedSource;

    #[test]
    fn test_link_kind_from_dlt() {
        assert_eq!(LinkKind::from_dlt(1), LinkKind::Ethernet);
        assert_eq!(LinkKind::from_dlt(0), LinkKind::Null);
        assert_eq!(LinkKind::from_dlt(12), LinkKind::RawIp);
        assert_eq!(LinkKind::from_dlt(101), LinkKind::RawIp);
        assert_eq!(LinkKind::from_dlt(113), LinkKind::LinuxSll);
        assert_eq!(LinkKind::from_dlt(127), LinkKind::Unknown(127));
    }

    #[test]
    fn test_handle_serialises_reads_and_filter_swaps() {
        let source = ScriptedSource::new(vec![]);
        let filters = source.filter_log();
        let handle = CaptureHandle::new("eth0", Box::new(source));

        assert_eq!(handle.interface(), "eth0");
        assert!(matches!(handle.read_next().unwrap(), ReadOutcome::Closed));
        handle.set_filter("tcp").unwrap();
        assert_eq!(*filters.lock(), vec!["tcp".to_string()]);
    }
}
