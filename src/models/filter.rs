use serde::Serialize;

use crate::models::packet::Protocol;
use crate::utils::error::{AppError, AppResult};

/// A protocol filter selectable at runtime.
///
/// The table is fixed at build time; the index into [`PROTOCOL_FILTERS`] is
/// the only handle used to refer to a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilterChoice {
    /// Short label shown in the filter bar
    pub label: &'static str,

    /// Capture expression applied to every open handle
    pub expression: &'static str,

    /// Human-readable description
    pub description: &'static str,
}

pub const PROTOCOL_FILTERS: [FilterChoice; 8] = [
    FilterChoice {
        label: "ALL",
        expression: "ip or ip6",
        description: "All IPv4/IPv6 traffic (L3)",
    },
    FilterChoice {
        label: "HTTPS",
        expression: "tcp port 443",
        description: "HTTPS (HTTP over TLS over TCP 443) (L7, encrypted)",
    },
    FilterChoice {
        label: "HTTP",
        expression: "tcp port 80 or tcp port 8080",
        description: "HTTP over TCP ports 80/8080 (L7)",
    },
    FilterChoice {
        label: "DNS",
        expression: "udp port 53 or tcp port 53",
        description: "DNS queries and responses (L7)",
    },
    FilterChoice {
        label: "TCP",
        expression: "tcp",
        description: "All TCP packets (L4)",
    },
    FilterChoice {
        label: "UDP",
        expression: "udp",
        description: "All UDP packets (L4)",
    },
    FilterChoice {
        label: "QUIC",
        expression: "udp port 443",
        description: "QUIC over UDP port 443 (UDP-based transport)",
    },
    FilterChoice {
        label: "ICMP",
        expression: "icmp or icmp6",
        description: "ICMP/ICMPv6 packets (L3)",
    },
];

impl FilterChoice {
    /// Whether a record with this protocol label belongs under this filter.
    /// Unknown filter labels let everything through.
    pub fn matches(&self, protocol: Protocol) -> bool {
        match self.label {
            "ALL" => true,
            "TCP" => matches!(protocol, Protocol::Tcp | Protocol::Http | Protocol::Tls),
            "UDP" => matches!(protocol, Protocol::Udp | Protocol::Dns),
            "QUIC" => protocol == Protocol::Quic,
            "DNS" => protocol == Protocol::Dns,
            "HTTP" => protocol == Protocol::Http,
            "HTTPS" => protocol == Protocol::Tls,
            "ICMP" => matches!(protocol, Protocol::Icmp | Protocol::Icmpv6),
            _ => true,
        }
    }
}

/// Look up a filter by index; `None` for anything out of range
pub fn filter_at(index: usize) -> Option<&'static FilterChoice> {
    PROTOCOL_FILTERS.get(index)
}

/// Resolve a user-supplied filter name: a label (any case) or a 1-based
/// position in the table.
pub fn find_filter(name: &str) -> AppResult<usize> {
    let name = name.trim();

    if let Ok(position) = name.parse::<usize>() {
        if (1..=PROTOCOL_FILTERS.len()).contains(&position) {
            return Ok(position - 1);
        }
        return Err(AppError::InvalidFilter(name.to_string()));
    }

    PROTOCOL_FILTERS
        .iter()
        .position(|f| f.label.eq_ignore_ascii_case(name))
        .ok_or_else(|| AppError::InvalidFilter(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(label: &str) -> &'static FilterChoice {
        &PROTOCOL_FILTERS[find_filter(label).unwrap()]
    }

    #[test]
    fn test_filter_label_matching() {
        assert!(filter("TCP").matches(Protocol::Tcp));
        assert!(filter("TCP").matches(Protocol::Http));
        assert!(filter("TCP").matches(Protocol::Tls));
        assert!(!filter("TCP").matches(Protocol::Udp));

        assert!(filter("UDP").matches(Protocol::Dns));
        assert!(!filter("UDP").matches(Protocol::Quic));

        assert!(filter("QUIC").matches(Protocol::Quic));
        assert!(filter("HTTPS").matches(Protocol::Tls));
        assert!(!filter("HTTPS").matches(Protocol::Http));
        assert!(filter("ICMP").matches(Protocol::Icmpv6));
        assert!(filter("ALL").matches(Protocol::Pkt));
    }

    #[test]
    fn test_unknown_label_fails_open() {
        let custom = FilterChoice {
            label: "SCTP",
            expression: "sctp",
            description: "",
        };
        assert!(custom.matches(Protocol::Arp));
    }

    #[test]
    fn test_find_filter_by_label_and_position() {
        assert_eq!(find_filter("all").unwrap(), 0);
        assert_eq!(find_filter("Https").unwrap(), 1);
        assert_eq!(find_filter("8").unwrap(), 7);
        assert!(find_filter("0").is_err());
        assert!(find_filter("9").is_err());
        assert!(find_filter("smtp").is_err());
    }

    #[test]
    fn test_filter_at_out_of_range() {
        assert!(filter_at(PROTOCOL_FILTERS.len()).is_none());
        assert_eq!(filter_at(4).map(|f| f.label), Some("TCP"));
    }
}
