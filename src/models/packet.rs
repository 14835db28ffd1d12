use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of protocol labels a frame can be classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Dns,
    Http,
    Tls,
    Tcp,
    Quic,
    Udp,
    Icmp,
    Icmpv6,
    /// Network layer recognised but nothing more specific above it
    Ipv4,
    Ipv6,
    Arp,
    /// No recognisable network layer
    Pkt,
}

impl Protocol {
    /// Label as shown in the packet list
    pub fn label(&self) -> &'static str {
        match self {
            Protocol::Dns => "DNS",
            Protocol::Http => "HTTP",
            Protocol::Tls => "TLS",
            Protocol::Tcp => "TCP",
            Protocol::Quic => "QUIC",
            Protocol::Udp => "UDP",
            Protocol::Icmp => "ICMP",
            Protocol::Icmpv6 => "ICMPv6",
            Protocol::Ipv4 => "IPv4",
            Protocol::Ipv6 => "IPv6",
            Protocol::Arp => "ARP",
            Protocol::Pkt => "PKT",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A classified frame as kept in the retention buffer.
///
/// Built in one go by the capture worker; every field is populated before the
/// record is forwarded and nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketRecord {
    /// Capture time from the provider, or parse time if it had none
    pub timestamp: DateTime<Utc>,

    /// Interface the frame was captured on
    pub interface: String,

    /// Protocol label
    pub protocol: Protocol,

    /// `ip[:port]` or `"unknown"`
    pub source: String,

    /// `ip[:port]` or `"unknown"`
    pub destination: String,

    /// Short protocol-specific summary, possibly empty
    pub detail: String,
}

impl PacketRecord {
    /// Case-insensitive substring match against either endpoint.
    ///
    /// `needle_lower` must already be lowercase; callers lowercase the search
    /// text once per scan rather than once per record.
    pub fn endpoint_contains(&self, needle_lower: &str) -> bool {
        self.source.to_lowercase().contains(needle_lower)
            || self.destination.to_lowercase().contains(needle_lower)
    }
}
