use chrono::Local;
use serde::Serialize;
use std::ops::Range;

use crate::models::packet::{PacketRecord, Protocol};
use crate::models::state::{AppState, Density};
use crate::models::stats::StatsSnapshot;
use crate::utils::text::{pad_to, sanitize_for_display, truncate_with_ellipsis};

const COMPACT_ENDPOINT_WIDTH: usize = 35;
const EXPANDED_ENDPOINT_WIDTH: usize = 50;
const COMPACT_TIME_FORMAT: &str = "%H:%M:%S";
const EXPANDED_TIME_FORMAT: &str = "%H:%M:%S%.3f";

/// One line of the packet list, ready to be drawn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedEntry {
    pub protocol: Protocol,

    /// Source endpoint, padded to the column width
    pub source: String,

    /// Byte range of the search match inside `source`
    pub source_highlight: Option<Range<usize>>,

    /// Destination endpoint, padded to the column width
    pub destination: String,

    pub destination_highlight: Option<Range<usize>>,

    /// Local capture time
    pub timestamp: String,

    pub detail: String,
}

/// Everything the display surface receives on one refresh
#[derive(Debug, Clone, Serialize)]
pub struct DisplayFrame {
    pub entries: Vec<RenderedEntry>,
    pub filter_index: usize,
    pub search: String,
    pub search_mode: bool,
    pub density: Density,
    /// Records currently held in the retention buffer
    pub retained: usize,
    pub stats: StatsSnapshot,
    pub interfaces: Vec<String>,
    /// Failures from the last filter change
    pub status: Option<String>,
}

impl DisplayFrame {
    pub fn new(
        entries: Vec<RenderedEntry>,
        state: &AppState,
        retained: usize,
        stats: StatsSnapshot,
        interfaces: Vec<String>,
    ) -> Self {
        Self {
            entries,
            filter_index: state.filter_index,
            search: state.search.clone(),
            search_mode: state.search_mode,
            density: state.density,
            retained,
            stats,
            interfaces,
            status: state.status.clone(),
        }
    }
}

/// Lay out a record for the given density.
///
/// Endpoints and detail are stripped of control characters first. Compact
/// rows cut endpoints at 35 characters; expanded rows keep them whole and use
/// a wider column and millisecond timestamps.
pub fn render_entry(record: &PacketRecord, density: Density, search: &str) -> RenderedEntry {
    let source = sanitize_for_display(&record.source);
    let destination = sanitize_for_display(&record.destination);

    let (source, destination, width, time_format) = match density {
        Density::Compact => (
            truncate_with_ellipsis(&source, COMPACT_ENDPOINT_WIDTH),
            truncate_with_ellipsis(&destination, COMPACT_ENDPOINT_WIDTH),
            COMPACT_ENDPOINT_WIDTH,
            COMPACT_TIME_FORMAT,
        ),
        Density::Expanded => (source, destination, EXPANDED_ENDPOINT_WIDTH, EXPANDED_TIME_FORMAT),
    };

    let search = search.trim();
    RenderedEntry {
        protocol: record.protocol,
        source_highlight: find_ignore_case(&source, search),
        source: pad_to(&source, width),
        destination_highlight: find_ignore_case(&destination, search),
        destination: pad_to(&destination, width),
        timestamp: record
            .timestamp
            .with_timezone(&Local)
            .format(time_format)
            .to_string(),
        detail: sanitize_for_display(&record.detail),
    }
}

/// Byte range of the first ASCII case-insensitive occurrence of `needle`
fn find_ignore_case(haystack: &str, needle: &str) -> Option<Range<usize>> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    let bytes = haystack.as_bytes();
    (0..=bytes.len() - needle.len())
        .filter(|&start| haystack.is_char_boundary(start) && haystack.is_char_boundary(start + needle.len()))
        .find(|&start| bytes[start..start + needle.len()].eq_ignore_ascii_case(needle.as_bytes()))
        .map(|start| start..start + needle.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::record;

    #[test]
    fn test_compact_layout() {
        let rec = record(Protocol::Tcp, "10.0.0.5:443", "192.168.1.2:50000", 1);
        let entry = render_entry(&rec, Density::Compact, "");

        assert_eq!(entry.source.chars().count(), 35);
        assert!(entry.source.starts_with("10.0.0.5:443 "));
        assert_eq!(entry.destination.trim_end(), "192.168.1.2:50000");
        assert_eq!(entry.timestamp.len(), 8);
        assert_eq!(entry.detail, "#1");
        assert!(entry.source_highlight.is_none());
    }

    #[test]
    fn test_compact_truncates_long_endpoints() {
        let long = "2001:db8:85a3:1234:5678:8a2e:370:7334:443";
        let rec = record(Protocol::Udp, long, "::1:53", 1);

        let compact = render_entry(&rec, Density::Compact, "");
        assert_eq!(compact.source.chars().count(), 35);
        assert!(compact.source.ends_with("..."));

        let expanded = render_entry(&rec, Density::Expanded, "");
        assert_eq!(expanded.source.trim_end(), long);
        assert_eq!(expanded.source.chars().count(), 50);
    }

    #[test]
    fn test_expanded_timestamp_has_milliseconds() {
        let rec = record(Protocol::Tcp, "a", "b", 1);
        let entry = render_entry(&rec, Density::Expanded, "");
        assert_eq!(entry.timestamp.len(), 12);
        assert_eq!(&entry.timestamp[8..9], ".");
    }

    #[test]
    fn test_control_characters_removed() {
        let mut rec = record(Protocol::Http, "10.0.0.1:80", "10.0.0.2:5000", 1);
        rec.detail = "GET /\x1b[31mred HTTP/1.1".into();
        let entry = render_entry(&rec, Density::Compact, "");
        assert_eq!(entry.detail, "GET /[31mred HTTP/1.1");
    }

    #[test]
    fn test_search_highlight_ranges() {
        let rec = record(Protocol::Tls, "192.168.1.2:50003", "10.0.0.5:443", 1);
        let entry = render_entry(&rec, Density::Compact, "0.0.5");
        assert_eq!(entry.source_highlight, None);
        assert_eq!(entry.destination_highlight, Some(3..8));
        assert_eq!(&entry.destination[3..8], "0.0.5");

        let rec = record(Protocol::Icmpv6, "FE80::1", "ff02::1", 2);
        let entry = render_entry(&rec, Density::Compact, "fe80");
        assert_eq!(entry.source_highlight, Some(0..4));
    }

    #[test]
    fn test_display_frame_copies_state() {
        let mut state = AppState::new(4);
        state.search = "10.".into();
        state.search_mode = true;
        state.density = Density::Expanded;
        state.status = Some("en1 rejected the filter".into());

        let frame = DisplayFrame::new(vec![], &state, 7, StatsSnapshot::default(), vec!["eth0".into()]);
        assert_eq!(frame.filter_index, 4);
        assert_eq!(frame.search, "10.");
        assert!(frame.search_mode);
        assert_eq!(frame.density, Density::Expanded);
        assert_eq!(frame.retained, 7);
        assert_eq!(frame.interfaces, vec!["eth0".to_string()]);
        assert_eq!(frame.status.as_deref(), Some("en1 rejected the filter"));
    }
}
