//! Hand-built packet fixtures for the unit tests.

use chrono::{DateTime, Utc};
use std::net::IpAddr;

use crate::packet::{CapturedPacket, DnsMessage, Layer, TcpFlags};

pub fn ts(secs: f64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros((secs * 1_000_000.0) as i64).unwrap()
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn net_layer(src: &str, dst: &str) -> Layer {
    match (ip(src), ip(dst)) {
        (IpAddr::V4(s), IpAddr::V4(d)) => Layer::Ipv4 {
            src: s,
            dst: d,
            ttl: 64,
        },
        (IpAddr::V6(s), IpAddr::V6(d)) => Layer::Ipv6 {
            src: s,
            dst: d,
            hop_limit: 64,
        },
        _ => panic!("mixed address families in fixture"),
    }
}

pub fn tcp_packet(
    index: u64,
    secs: f64,
    src: &str,
    sport: u16,
    dst: &str,
    dport: u16,
    flag_bits: u8,
    length: u32,
    payload: &[u8],
) -> CapturedPacket {
    let mut layers = vec![
        Layer::Ethernet,
        net_layer(src, dst),
        Layer::Tcp {
            src_port: sport,
            dst_port: dport,
            flags: TcpFlags::from_bits(flag_bits),
        },
    ];
    if !payload.is_empty() {
        layers.push(Layer::Payload(payload.to_vec()));
    }
    CapturedPacket {
        index,
        timestamp: ts(secs),
        length,
        layers,
    }
}

pub fn udp_packet(
    index: u64,
    secs: f64,
    src: &str,
    sport: u16,
    dst: &str,
    dport: u16,
    length: u32,
    payload: &[u8],
) -> CapturedPacket {
    let mut layers = vec![
        Layer::Ethernet,
        net_layer(src, dst),
        Layer::Udp {
            src_port: sport,
            dst_port: dport,
        },
    ];
    if !payload.is_empty() {
        layers.push(Layer::Payload(payload.to_vec()));
    }
    CapturedPacket {
        index,
        timestamp: ts(secs),
        length,
        layers,
    }
}

pub fn dns_query_packet(
    index: u64,
    secs: f64,
    src: &str,
    dst: &str,
    name: Option<&str>,
    length: u32,
) -> CapturedPacket {
    CapturedPacket {
        index,
        timestamp: ts(secs),
        length,
        layers: vec![
            Layer::Ethernet,
            net_layer(src, dst),
            Layer::Udp {
                src_port: 40000 + index as u16,
                dst_port: 53,
            },
            Layer::Dns(DnsMessage {
                is_response: false,
                query_name: name.map(|n| n.to_string()),
            }),
        ],
    }
}

pub fn dns_response_packet(
    index: u64,
    secs: f64,
    src: &str,
    dst: &str,
    name: &str,
    length: u32,
) -> CapturedPacket {
    CapturedPacket {
        index,
        timestamp: ts(secs),
        length,
        layers: vec![
            Layer::Ethernet,
            net_layer(src, dst),
            Layer::Udp {
                src_port: 53,
                dst_port: 40000 + index as u16,
            },
            Layer::Dns(DnsMessage {
                is_response: true,
                query_name: Some(name.to_string()),
            }),
        ],
    }
}

pub fn icmp_packet(index: u64, secs: f64, src: &str, dst: &str, length: u32) -> CapturedPacket {
    CapturedPacket {
        index,
        timestamp: ts(secs),
        length,
        layers: vec![
            Layer::Ethernet,
            net_layer(src, dst),
            Layer::Icmp {
                icmp_type: 8,
                code: 0,
            },
        ],
    }
}

pub fn arp_packet(index: u64, secs: f64, sender: &str, target: &str, length: u32) -> CapturedPacket {
    CapturedPacket {
        index,
        timestamp: ts(secs),
        length,
        layers: vec![
            Layer::Ethernet,
            Layer::Arp {
                sender_ip: sender.parse().unwrap(),
                target_ip: target.parse().unwrap(),
            },
        ],
    }
}
