use log::{log_enabled, trace, Level};
use pnet::packet::{
    arp::ArpPacket,
    ethernet::{EtherType, EtherTypes, EthernetPacket},
    ip::{IpNextHeaderProtocol, IpNextHeaderProtocols},
    ipv4::Ipv4Packet,
    ipv6::Ipv6Packet,
    tcp::TcpPacket,
    udp::UdpPacket,
};
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::capture::dns::{self, DnsMessage};
use crate::capture::source::{LinkKind, RawFrame};

const ETHERNET_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;
const SLL_HEADER_LEN: usize = 16;
const NULL_HEADER_LEN: usize = 4;
const IPV6_HEADER_LEN: usize = 40;
const MAX_IPV6_EXTENSIONS: usize = 8;

/// Ports on which UDP payloads are decoded as DNS (unicast and multicast)
const DNS_PORTS: [u16; 2] = [53, 5353];

/// Network layer of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkLayer {
    Ipv4 { source: Ipv4Addr, destination: Ipv4Addr },
    Ipv6 { source: Ipv6Addr, destination: Ipv6Addr },
    Arp { sender: Ipv4Addr, target: Ipv4Addr },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpSegment<'a> {
    pub source_port: u16,
    pub destination_port: u16,
    /// Low byte of the TCP flags field (FIN..CWR)
    pub flags: u8,
    pub payload: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpDatagram<'a> {
    pub source_port: u16,
    pub destination_port: u16,
    pub payload: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportLayer<'a> {
    Tcp(TcpSegment<'a>),
    Udp(UdpDatagram<'a>),
}

impl TransportLayer<'_> {
    pub fn ports(&self) -> (u16, u16) {
        match self {
            TransportLayer::Tcp(t) => (t.source_port, t.destination_port),
            TransportLayer::Udp(u) => (u.source_port, u.destination_port),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpKind {
    V4,
    V6,
}

/// The layers that could be decoded from one frame.
///
/// Decoding stops at the first layer that is truncated or malformed; the
/// layers below it are kept and `truncated` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFrame<'a> {
    pub network: Option<NetworkLayer>,
    pub transport: Option<TransportLayer<'a>>,
    pub icmp: Option<IcmpKind>,
    pub dns: Option<DnsMessage>,
    pub truncated: bool,
}

/// Decode as many layers of a raw frame as possible. Never fails: a frame
/// nothing can be made of comes back empty.
pub fn dissect(frame: &RawFrame) -> ParsedFrame<'_> {
    let mut parsed = ParsedFrame::default();

    match link_payload(frame.link, &frame.data) {
        Some((ethertype, payload)) => decode_network(ethertype, payload, &mut parsed),
        None => parsed.truncated = true,
    }

    if parsed.truncated && log_enabled!(Level::Trace) {
        trace!(
            "Malformed {:?} frame of {} bytes, decoded {:?}",
            frame.link,
            frame.data.len(),
            parsed
        );
    }

    parsed
}

/// Strip the link header, returning the EtherType of what follows
fn link_payload(link: LinkKind, data: &[u8]) -> Option<(EtherType, &[u8])> {
    match link {
        LinkKind::Ethernet => {
            let eth = EthernetPacket::new(data)?;
            let ethertype = eth.get_ethertype();
            if ethertype == EtherTypes::Vlan {
                let inner = data.get(ETHERNET_HEADER_LEN..ETHERNET_HEADER_LEN + VLAN_TAG_LEN)?;
                let inner_type = EtherType(u16::from_be_bytes([inner[2], inner[3]]));
                return Some((inner_type, &data[ETHERNET_HEADER_LEN + VLAN_TAG_LEN..]));
            }
            Some((ethertype, &data[ETHERNET_HEADER_LEN..]))
        }
        LinkKind::LinuxSll => {
            let header = data.get(..SLL_HEADER_LEN)?;
            let ethertype = EtherType(u16::from_be_bytes([header[14], header[15]]));
            Some((ethertype, &data[SLL_HEADER_LEN..]))
        }
        LinkKind::Null => ip_by_version(data.get(NULL_HEADER_LEN..)?),
        LinkKind::RawIp => ip_by_version(data),
        LinkKind::Unknown(_) => None,
    }
}

fn ip_by_version(data: &[u8]) -> Option<(EtherType, &[u8])> {
    match data.first()? >> 4 {
        4 => Some((EtherTypes::Ipv4, data)),
        6 => Some((EtherTypes::Ipv6, data)),
        _ => None,
    }
}

fn decode_network<'a>(ethertype: EtherType, data: &'a [u8], parsed: &mut ParsedFrame<'a>) {
    match ethertype {
        EtherTypes::Ipv4 => decode_ipv4(data, parsed),
        EtherTypes::Ipv6 => decode_ipv6(data, parsed),
        EtherTypes::Arp => decode_arp(data, parsed),
        _ => {
            if log_enabled!(Level::Trace) {
                trace!("Unhandled EtherType {:?}", ethertype);
            }
        }
    }
}

fn decode_ipv4<'a>(data: &'a [u8], parsed: &mut ParsedFrame<'a>) {
    let Some(ip) = Ipv4Packet::new(data) else {
        parsed.truncated = true;
        return;
    };

    let header_len = ip.get_header_length() as usize * 4;
    if header_len < 20 || header_len > data.len() {
        parsed.truncated = true;
        return;
    }

    parsed.network = Some(NetworkLayer::Ipv4 {
        source: ip.get_source(),
        destination: ip.get_destination(),
    });

    // Only the first fragment carries the transport header.
    if ip.get_fragment_offset() != 0 {
        return;
    }

    let total_len = ip.get_total_length() as usize;
    let end = if total_len >= header_len {
        total_len.min(data.len())
    } else {
        data.len()
    };

    decode_transport(ip.get_next_level_protocol(), &data[header_len..end], parsed);
}

fn decode_ipv6<'a>(data: &'a [u8], parsed: &mut ParsedFrame<'a>) {
    let Some(ip) = Ipv6Packet::new(data) else {
        parsed.truncated = true;
        return;
    };

    parsed.network = Some(NetworkLayer::Ipv6 {
        source: ip.get_source(),
        destination: ip.get_destination(),
    });

    let end = (IPV6_HEADER_LEN + ip.get_payload_length() as usize).min(data.len());
    let mut rest = &data[IPV6_HEADER_LEN..end];
    let mut next = ip.get_next_header();

    for _ in 0..MAX_IPV6_EXTENSIONS {
        match next {
            IpNextHeaderProtocols::Hopopt
            | IpNextHeaderProtocols::Ipv6Route
            | IpNextHeaderProtocols::Ipv6Opts => {
                if rest.len() < 8 {
                    parsed.truncated = true;
                    return;
                }
                let len = (rest[1] as usize + 1) * 8;
                if rest.len() < len {
                    parsed.truncated = true;
                    return;
                }
                next = IpNextHeaderProtocol(rest[0]);
                rest = &rest[len..];
            }
            IpNextHeaderProtocols::Ipv6Frag => {
                if rest.len() < 8 {
                    parsed.truncated = true;
                    return;
                }
                let fragment_offset = u16::from_be_bytes([rest[2], rest[3]]) >> 3;
                next = IpNextHeaderProtocol(rest[0]);
                if fragment_offset != 0 {
                    return;
                }
                rest = &rest[8..];
            }
            _ => break,
        }
    }

    decode_transport(next, rest, parsed);
}

fn decode_arp<'a>(data: &'a [u8], parsed: &mut ParsedFrame<'a>) {
    match ArpPacket::new(data) {
        Some(arp) => {
            parsed.network = Some(NetworkLayer::Arp {
                sender: arp.get_sender_proto_addr(),
                target: arp.get_target_proto_addr(),
            });
        }
        None => parsed.truncated = true,
    }
}

fn decode_transport<'a>(protocol: IpNextHeaderProtocol, data: &'a [u8], parsed: &mut ParsedFrame<'a>) {
    match protocol {
        IpNextHeaderProtocols::Tcp => decode_tcp(data, parsed),
        IpNextHeaderProtocols::Udp => decode_udp(data, parsed),
        IpNextHeaderProtocols::Icmp => parsed.icmp = Some(IcmpKind::V4),
        IpNextHeaderProtocols::Icmpv6 => parsed.icmp = Some(IcmpKind::V6),
        _ => {}
    }
}

fn decode_tcp<'a>(data: &'a [u8], parsed: &mut ParsedFrame<'a>) {
    let Some(tcp) = TcpPacket::new(data) else {
        parsed.truncated = true;
        return;
    };

    let header_len = tcp.get_data_offset() as usize * 4;
    if header_len < 20 || header_len > data.len() {
        parsed.truncated = true;
        return;
    }

    parsed.transport = Some(TransportLayer::Tcp(TcpSegment {
        source_port: tcp.get_source(),
        destination_port: tcp.get_destination(),
        flags: (tcp.get_flags() as u16 & 0xFF) as u8,
        payload: &data[header_len..],
    }));
}

fn decode_udp<'a>(data: &'a [u8], parsed: &mut ParsedFrame<'a>) {
    let Some(udp) = UdpPacket::new(data) else {
        parsed.truncated = true;
        return;
    };

    let length = udp.get_length() as usize;
    let end = if length >= 8 { length.min(data.len()) } else { data.len() };
    let payload = &data[8..end];
    let source_port = udp.get_source();
    let destination_port = udp.get_destination();

    if DNS_PORTS.contains(&source_port) || DNS_PORTS.contains(&destination_port) {
        parsed.dns = dns::parse(payload);
    }

    parsed.transport = Some(TransportLayer::Udp(UdpDatagram {
        source_port,
        destination_port,
        payload,
    }));
}
