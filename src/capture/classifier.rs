use chrono::Utc;

use crate::capture::dns::{self, DnsEntry};
use crate::capture::parser::{self, IcmpKind, NetworkLayer, ParsedFrame, TcpSegment, TransportLayer};
use crate::capture::source::RawFrame;
use crate::models::packet::{PacketRecord, Protocol};
use crate::utils::text::truncate_with_ellipsis;

const HTTP_PORTS: [u16; 2] = [80, 8080];
const SECURE_PORT: u16 = 443;
const DNS_NAME_MAX: usize = 60;
const HTTP_LINE_MAX: usize = 100;

const HTTP_METHODS: [&str; 9] = [
    "GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS", "CONNECT", "TRACE",
];

/// TCP flag bits in summary order
const TCP_FLAG_NAMES: [(u8, &str); 6] = [
    (0x02, "SYN"),
    (0x10, "ACK"),
    (0x01, "FIN"),
    (0x04, "RST"),
    (0x08, "PSH"),
    (0x20, "URG"),
];

/// Label a parsed frame and produce its one-line detail.
///
/// Layers are checked in a fixed precedence order and the first match wins:
/// DNS, TCP (HTTP/TLS/TCP), UDP (QUIC/UDP), ICMP, then the bare network layer.
pub fn classify(frame: &ParsedFrame<'_>) -> (Protocol, String) {
    if let Some(message) = &frame.dns {
        let detail = if let Some(q) = &message.question {
            dns_detail("Q", q)
        } else if let Some(a) = &message.answer {
            dns_detail("A", a)
        } else {
            String::new()
        };
        return (Protocol::Dns, detail);
    }

    match &frame.transport {
        Some(TransportLayer::Tcp(segment)) => {
            if let Some(line) = http_request_line(segment) {
                return (Protocol::Http, line);
            }
            if segment.source_port == SECURE_PORT || segment.destination_port == SECURE_PORT {
                return (Protocol::Tls, String::new());
            }
            let flags = summarize_tcp_flags(segment.flags);
            if flags.is_empty() {
                return (Protocol::Tcp, String::new());
            }
            return (Protocol::Tcp, format!("flags={}", flags));
        }
        Some(TransportLayer::Udp(datagram)) => {
            let detail = format!("len={}", datagram.payload.len());
            if datagram.source_port == SECURE_PORT || datagram.destination_port == SECURE_PORT {
                return (Protocol::Quic, detail);
            }
            return (Protocol::Udp, detail);
        }
        None => {}
    }

    match frame.icmp {
        Some(IcmpKind::V4) => return (Protocol::Icmp, String::new()),
        Some(IcmpKind::V6) => return (Protocol::Icmpv6, String::new()),
        None => {}
    }

    let protocol = match frame.network {
        Some(NetworkLayer::Ipv4 { .. }) => Protocol::Ipv4,
        Some(NetworkLayer::Ipv6 { .. }) => Protocol::Ipv6,
        Some(NetworkLayer::Arp { .. }) => Protocol::Arp,
        None => Protocol::Pkt,
    };
    (protocol, String::new())
}

fn dns_detail(kind: &str, entry: &DnsEntry) -> String {
    format!(
        "{} {} {}",
        kind,
        dns::type_name(entry.record_type),
        truncate_with_ellipsis(&entry.name, DNS_NAME_MAX)
    )
}

/// Comma-joined names of the set flags, in SYN,ACK,FIN,RST,PSH,URG order
pub fn summarize_tcp_flags(flags: u8) -> String {
    TCP_FLAG_NAMES
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(",")
}

/// The sanitised request/status line of an HTTP segment on an HTTP port
fn http_request_line(segment: &TcpSegment<'_>) -> Option<String> {
    if segment.payload.is_empty() {
        return None;
    }
    let on_http_port = HTTP_PORTS.contains(&segment.source_port)
        || HTTP_PORTS.contains(&segment.destination_port);
    if !on_http_port {
        return None;
    }

    let line = first_line(segment.payload);
    if line.is_empty() {
        return None;
    }

    let is_request = HTTP_METHODS
        .iter()
        .any(|m| line.strip_prefix(m).is_some_and(|rest| rest.starts_with(' ')));
    if is_request || line.starts_with("HTTP/") {
        return Some(sanitize_http_line(&line));
    }
    None
}

/// First line of a payload, trimmed
pub fn first_line(payload: &[u8]) -> String {
    let end = payload
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(payload.len());
    String::from_utf8_lossy(&payload[..end]).trim().to_string()
}

/// Hide query strings and cap the line length.
///
/// `GET /x?y=1 HTTP/1.1` becomes `GET /x ?... HTTP/1.1`.
pub fn sanitize_http_line(line: &str) -> String {
    let mut line = line.to_string();

    if let Some(idx) = line.find('?') {
        let mut parts: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if parts.len() >= 3 {
            if let Some(q) = parts[1].find('?') {
                parts[1] = format!("{} ?...", &parts[1][..q]);
            }
            line = parts.join(" ");
        } else {
            line = format!("{} ?...", &line[..idx]);
        }
    }

    truncate_with_ellipsis(&line, HTTP_LINE_MAX)
}

/// Source and destination as `ip[:port]`, or `"unknown"` without a network
/// layer
pub fn endpoints(frame: &ParsedFrame<'_>) -> (String, String) {
    let (mut source, mut destination) = match frame.network {
        Some(NetworkLayer::Ipv4 { source, destination }) => (source.to_string(), destination.to_string()),
        Some(NetworkLayer::Ipv6 { source, destination }) => (source.to_string(), destination.to_string()),
        Some(NetworkLayer::Arp { sender, target }) => (sender.to_string(), target.to_string()),
        None => ("unknown".to_string(), "unknown".to_string()),
    };

    if let Some(transport) = &frame.transport {
        let (source_port, destination_port) = transport.ports();
        source = format!("{}:{}", source, source_port);
        destination = format!("{}:{}", destination, destination_port);
    }

    (source, destination)
}

/// Turn a raw frame into a complete record for `interface`
pub fn build_record(interface: &str, raw: &RawFrame) -> PacketRecord {
    let parsed = parser::dissect(raw);
    let (protocol, detail) = classify(&parsed);
    let (source, destination) = endpoints(&parsed);

    PacketRecord {
        timestamp: raw.timestamp.unwrap_or_else(Utc::now),
        interface: interface.to_string(),
        protocol,
        source,
        destination,
        detail,
    }
}
