use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

// ---------------------------------------------------------------------------
// PacketRecord: one row of the record table, immutable after parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketRecord {
    /// Seconds since the Unix epoch, fractional.
    pub timestamp: f64,
    pub src_ip: Option<IpAddr>,
    pub dst_ip: Option<IpAddr>,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    pub main_protocol: String,
    pub full_protocol: String,
    pub length: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransportProto {
    Tcp,
    Udp,
}

// ---------------------------------------------------------------------------
// Connection tracking
// ---------------------------------------------------------------------------

/// Directional key: a reply stream gets its own entry. Direction is never
/// canonicalized here; see the tracker docs for the consequences.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionKey {
    pub src_ip: IpAddr,
    pub src_port: u16,
    pub dst_ip: IpAddr,
    pub dst_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub packet_count: u64,
    pub byte_count: u64,
    pub syn_count: u64,
    pub syn_ack_count: u64,
    pub ack_count: u64,
    pub fin_count: u64,
    pub rst_count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub handshake_complete: bool,
}

// ---------------------------------------------------------------------------
// Detector output records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub port_count: usize,
    /// Lowest-port sample of the contacted (protocol, port) pairs, capped at 20.
    pub sampled_ports: Vec<(TransportProto, u16)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncompleteConnection {
    pub src_ip: IpAddr,
    pub src_port: u16,
    pub dst_ip: IpAddr,
    pub dst_port: u16,
    pub syn_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsQueryRecord {
    pub src_ip: IpAddr,
    pub query_name: String,
    pub name_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspiciousDnsRecord {
    pub src_ip: IpAddr,
    pub query_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRequestRecord {
    pub src_ip: Option<IpAddr>,
    pub dst_ip: Option<IpAddr>,
    pub method: String,
    pub url: String,
    pub version: String,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpResponseRecord {
    pub src_ip: Option<IpAddr>,
    pub dst_ip: Option<IpAddr>,
    pub status_code: u16,
    pub timestamp: f64,
}

// ---------------------------------------------------------------------------
// Supplementary statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolSizeStats {
    pub count: u64,
    pub total_bytes: u64,
    pub mean: f64,
    pub min: u32,
    pub max: u32,
    pub std_dev: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficBucket {
    /// Bucket start, seconds since epoch, floored to the interval.
    pub start: f64,
    pub packets: u64,
    pub bytes: u64,
    pub is_spike: bool,
}
