//! Test fixtures: a scripted in-memory capture source and frame builders.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use pnet::packet::{
    ethernet::{EtherType, MutableEthernetPacket},
    ip::IpNextHeaderProtocol,
    ipv4::{self, Ipv4Flags, MutableIpv4Packet},
    ipv6::MutableIpv6Packet,
    tcp::MutableTcpPacket,
    udp::MutableUdpPacket,
};
use pnet::util::MacAddr;
use std::collections::VecDeque;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use crate::capture::source::{FrameSource, LinkKind, RawFrame, ReadOutcome};
use crate::models::packet::{PacketRecord, Protocol};
use crate::utils::error::{AppError, AppResult};

pub const TCP_FIN: u8 = 0x01;
pub const TCP_SYN: u8 = 0x02;
pub const TCP_RST: u8 = 0x04;
pub const TCP_PSH: u8 = 0x08;
pub const TCP_ACK: u8 = 0x10;
pub const TCP_URG: u8 = 0x20;

/// Frame source replaying a fixed list of frames.
///
/// Once the script is exhausted it reports `Closed`, or `Timeout` forever
/// when built with [`ScriptedSource::held_open`].
pub struct ScriptedSource {
    frames: VecDeque<RawFrame>,
    hold_open: bool,
    reject_filters: bool,
    filters: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSource {
    pub fn new(frames: Vec<RawFrame>) -> Self {
        Self {
            frames: frames.into(),
            hold_open: false,
            reject_filters: false,
            filters: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn held_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn rejecting_filters(mut self) -> Self {
        self.reject_filters = true;
        self
    }

    /// Every expression successfully applied, in order
    pub fn filter_log(&self) -> Arc<Mutex<Vec<String>>> {
        self.filters.clone()
    }
}

impl FrameSource for ScriptedSource {
    fn read_next(&mut self) -> AppResult<ReadOutcome> {
        match self.frames.pop_front() {
            Some(frame) => Ok(ReadOutcome::Frame(frame)),
            None if self.hold_open => {
                std::thread::sleep(std::time::Duration::from_millis(5));
                Ok(ReadOutcome::Timeout)
            }
            None => Ok(ReadOutcome::Closed),
        }
    }

    fn set_filter(&mut self, expression: &str) -> AppResult<()> {
        if self.reject_filters {
            return Err(AppError::FilterApply {
                interface: "scripted".into(),
                expression: expression.into(),
                reason: "syntax error".into(),
            });
        }
        self.filters.lock().push(expression.to_string());
        Ok(())
    }
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// A record with the given label, for buffer and selection tests
pub fn record(protocol: Protocol, source: &str, destination: &str, seq: i64) -> PacketRecord {
    PacketRecord {
        timestamp: ts(seq),
        interface: "eth0".into(),
        protocol,
        source: source.into(),
        destination: destination.into(),
        detail: format!("#{}", seq),
    }
}

pub fn ethernet(ethertype: u16, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; MutableEthernetPacket::minimum_packet_size() + payload.len()];
    let mut eth = MutableEthernetPacket::new(&mut buf).unwrap();
    eth.set_destination(MacAddr::new(0x02, 0, 0, 0, 0, 0x01));
    eth.set_source(MacAddr::new(0x02, 0, 0, 0, 0, 0x02));
    eth.set_ethertype(EtherType(ethertype));
    eth.set_payload(payload);
    buf
}

pub fn ipv4(protocol: u8, src: Ipv4Addr, dst: Ipv4Addr, payload: &[u8]) -> Vec<u8> {
    let header_len = MutableIpv4Packet::minimum_packet_size();
    let mut buf = vec![0u8; header_len + payload.len()];
    let mut ip = MutableIpv4Packet::new(&mut buf).unwrap();
    ip.set_version(4);
    ip.set_header_length((header_len / 4) as u8);
    ip.set_total_length((header_len + payload.len()) as u16);
    ip.set_flags(Ipv4Flags::DontFragment);
    ip.set_ttl(64);
    ip.set_next_level_protocol(IpNextHeaderProtocol(protocol));
    ip.set_source(src);
    ip.set_destination(dst);
    ip.set_payload(payload);
    let checksum = ipv4::checksum(&ip.to_immutable());
    ip.set_checksum(checksum);
    buf
}

pub fn ipv6(next_header: u8, src: Ipv6Addr, dst: Ipv6Addr, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; MutableIpv6Packet::minimum_packet_size() + payload.len()];
    let mut ip = MutableIpv6Packet::new(&mut buf).unwrap();
    ip.set_version(6);
    ip.set_payload_length(payload.len() as u16);
    ip.set_next_header(IpNextHeaderProtocol(next_header));
    ip.set_hop_limit(64);
    ip.set_source(src);
    ip.set_destination(dst);
    ip.set_payload(payload);
    buf
}

pub fn tcp(src_port: u16, dst_port: u16, flags: u8, payload: &[u8]) -> Vec<u8> {
    let header_len = MutableTcpPacket::minimum_packet_size();
    let mut buf = vec![0u8; header_len + payload.len()];
    let mut segment = MutableTcpPacket::new(&mut buf).unwrap();
    segment.set_source(src_port);
    segment.set_destination(dst_port);
    segment.set_sequence(1);
    segment.set_data_offset((header_len / 4) as u8);
    segment.set_flags(flags.into());
    segment.set_window(0xffff);
    segment.set_payload(payload);
    buf
}

pub fn udp(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let length = MutableUdpPacket::minimum_packet_size() + payload.len();
    let mut buf = vec![0u8; length];
    let mut datagram = MutableUdpPacket::new(&mut buf).unwrap();
    datagram.set_source(src_port);
    datagram.set_destination(dst_port);
    datagram.set_length(length as u16);
    datagram.set_payload(payload);
    buf
}

fn encode_name(name: &str, out: &mut Vec<u8>) {
    for label in name.split('.').filter(|l| !l.is_empty()) {
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);
}

/// DNS query with a single question
pub fn dns_query(name: &str, qtype: u16) -> Vec<u8> {
    let mut msg = vec![0x12, 0x34, 0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0];
    encode_name(name, &mut msg);
    msg.extend_from_slice(&qtype.to_be_bytes());
    msg.extend_from_slice(&[0, 1]);
    msg
}

/// DNS response carrying one A answer and no question section
pub fn dns_answer_only(name: &str, rtype: u16) -> Vec<u8> {
    let mut msg = vec![0x12, 0x34, 0x81, 0x80, 0, 0, 0, 1, 0, 0, 0, 0];
    encode_name(name, &mut msg);
    msg.extend_from_slice(&rtype.to_be_bytes());
    msg.extend_from_slice(&[0, 1, 0, 0, 0x0e, 0x10, 0, 4, 93, 184, 216, 34]);
    msg
}

pub fn frame(data: Vec<u8>) -> RawFrame {
    RawFrame {
        data,
        timestamp: Some(ts(0)),
        link: LinkKind::Ethernet,
    }
}

pub fn tcp_frame(src: [u8; 4], dst: [u8; 4], src_port: u16, dst_port: u16, flags: u8, payload: &[u8]) -> RawFrame {
    let segment = tcp(src_port, dst_port, flags, payload);
    frame(ethernet(0x0800, &ipv4(6, src.into(), dst.into(), &segment)))
}

pub fn udp_frame(src: [u8; 4], dst: [u8; 4], src_port: u16, dst_port: u16, payload: &[u8]) -> RawFrame {
    let datagram = udp(src_port, dst_port, payload);
    frame(ethernet(0x0800, &ipv4(17, src.into(), dst.into(), &datagram)))
}
