use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CHAIN_SEPARATOR: &str = " -> ";

// ---------------------------------------------------------------------------
// TcpFlags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TcpFlags {
    pub fin: bool,
    pub syn: bool,
    pub rst: bool,
    pub psh: bool,
    pub ack: bool,
    pub urg: bool,
    pub ece: bool,
    pub cwr: bool,
}

impl TcpFlags {
    pub fn from_bits(flags: u8) -> Self {
        Self {
            fin: flags & 0x01 != 0,
            syn: flags & 0x02 != 0,
            rst: flags & 0x04 != 0,
            psh: flags & 0x08 != 0,
            ack: flags & 0x10 != 0,
            urg: flags & 0x20 != 0,
            ece: flags & 0x40 != 0,
            cwr: flags & 0x80 != 0,
        }
    }

    pub fn bits(&self) -> u8 {
        (self.fin as u8)
            | (self.syn as u8) << 1
            | (self.rst as u8) << 2
            | (self.psh as u8) << 3
            | (self.ack as u8) << 4
            | (self.urg as u8) << 5
            | (self.ece as u8) << 6
            | (self.cwr as u8) << 7
    }

    pub fn is_syn_only(&self) -> bool {
        self.syn && !self.ack
    }

    pub fn is_syn_ack(&self) -> bool {
        self.syn && self.ack
    }
}

// ---------------------------------------------------------------------------
// Layer: one decoded protocol layer, outermost first in the packet stack
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DnsMessage {
    pub is_response: bool,
    /// First question name, absent when the question section is missing.
    pub query_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Ethernet,
    Arp {
        sender_ip: Ipv4Addr,
        target_ip: Ipv4Addr,
    },
    Ipv4 {
        src: Ipv4Addr,
        dst: Ipv4Addr,
        ttl: u8,
    },
    Ipv6 {
        src: Ipv6Addr,
        dst: Ipv6Addr,
        hop_limit: u8,
    },
    Tcp {
        src_port: u16,
        dst_port: u16,
        flags: TcpFlags,
    },
    Udp {
        src_port: u16,
        dst_port: u16,
    },
    Icmp {
        icmp_type: u8,
        code: u8,
    },
    Dns(DnsMessage),
    Payload(Vec<u8>),
}

impl Layer {
    /// Name used in the displayed protocol chain.
    pub fn name(&self) -> &'static str {
        match self {
            Layer::Ethernet => "Ethernet",
            Layer::Arp { .. } => "ARP",
            Layer::Ipv4 { .. } => "IP",
            Layer::Ipv6 { .. } => "IPv6",
            Layer::Tcp { .. } => "TCP",
            Layer::Udp { .. } => "UDP",
            Layer::Icmp { .. } => "ICMP",
            Layer::Dns(_) => "DNS",
            Layer::Payload(_) => "Raw",
        }
    }
}

// ---------------------------------------------------------------------------
// CapturedPacket: a fully decoded packet with its layer stack
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedPacket {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    /// Original wire length in bytes.
    pub length: u32,
    pub layers: Vec<Layer>,
}

impl CapturedPacket {
    pub fn epoch_secs(&self) -> f64 {
        self.timestamp.timestamp_micros() as f64 / 1_000_000.0
    }

    /// Source address from the network layer only (IPv4/IPv6).
    pub fn network_src(&self) -> Option<IpAddr> {
        self.layers.iter().find_map(|l| match l {
            Layer::Ipv4 { src, .. } => Some(IpAddr::V4(*src)),
            Layer::Ipv6 { src, .. } => Some(IpAddr::V6(*src)),
            _ => None,
        })
    }

    pub fn network_dst(&self) -> Option<IpAddr> {
        self.layers.iter().find_map(|l| match l {
            Layer::Ipv4 { dst, .. } => Some(IpAddr::V4(*dst)),
            Layer::Ipv6 { dst, .. } => Some(IpAddr::V6(*dst)),
            _ => None,
        })
    }

    /// Source address preferring the network layer, falling back to the ARP
    /// sender address when no network layer is present.
    pub fn src_addr(&self) -> Option<IpAddr> {
        self.network_src().or_else(|| {
            self.layers.iter().find_map(|l| match l {
                Layer::Arp { sender_ip, .. } => Some(IpAddr::V4(*sender_ip)),
                _ => None,
            })
        })
    }

    pub fn dst_addr(&self) -> Option<IpAddr> {
        self.network_dst().or_else(|| {
            self.layers.iter().find_map(|l| match l {
                Layer::Arp { target_ip, .. } => Some(IpAddr::V4(*target_ip)),
                _ => None,
            })
        })
    }

    /// (src_port, dst_port) from the transport layer, if any.
    pub fn transport_ports(&self) -> Option<(u16, u16)> {
        self.layers.iter().find_map(|l| match l {
            Layer::Tcp {
                src_port, dst_port, ..
            }
            | Layer::Udp { src_port, dst_port } => Some((*src_port, *dst_port)),
            _ => None,
        })
    }

    pub fn tcp_flags(&self) -> Option<TcpFlags> {
        self.layers.iter().find_map(|l| match l {
            Layer::Tcp { flags, .. } => Some(*flags),
            _ => None,
        })
    }

    pub fn has_tcp(&self) -> bool {
        self.layers.iter().any(|l| matches!(l, Layer::Tcp { .. }))
    }

    pub fn has_udp(&self) -> bool {
        self.layers.iter().any(|l| matches!(l, Layer::Udp { .. }))
    }

    pub fn icmp(&self) -> Option<(u8, u8)> {
        self.layers.iter().find_map(|l| match l {
            Layer::Icmp { icmp_type, code } => Some((*icmp_type, *code)),
            _ => None,
        })
    }

    pub fn dns(&self) -> Option<&DnsMessage> {
        self.layers.iter().find_map(|l| match l {
            Layer::Dns(msg) => Some(msg),
            _ => None,
        })
    }

    /// Application payload bytes, if the packet carries an undissected payload.
    pub fn payload(&self) -> Option<&[u8]> {
        self.layers.iter().find_map(|l| match l {
            Layer::Payload(data) => Some(data.as_slice()),
            _ => None,
        })
    }

    /// Layer names outermost to innermost, joined with " -> ".
    pub fn protocol_chain(&self) -> String {
        self.layers
            .iter()
            .map(|l| l.name())
            .collect::<Vec<_>>()
            .join(CHAIN_SEPARATOR)
    }

    /// Innermost layer name, or "UNKNOWN" when nothing decoded.
    pub fn main_protocol(&self) -> &'static str {
        self.layers.last().map(|l| l.name()).unwrap_or("UNKNOWN")
    }
}
