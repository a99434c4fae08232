use std::collections::HashMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::ParseOutput;
use crate::capture::Capture;
use crate::config::AnalysisConfig;
use crate::connections::track_connections;
use crate::dns::{detect_dns_anomalies, DnsFindings};
use crate::http::extract_http;
use crate::models::{
    ConnectionKey, ConnectionRecord, HttpRequestRecord, HttpResponseRecord, IncompleteConnection,
    PacketRecord, ProtocolSizeStats, ScanRecord, TrafficBucket,
};
use crate::packet::CapturedPacket;
use crate::scan::{detect_icmp_flood, detect_port_scanning, detect_syn_flood};
use crate::stats::{
    detect_traffic_spikes, detect_unusual_protocols, protocol_statistics,
    DEFAULT_PROTOCOL_WHITELIST, DEFAULT_SPIKE_INTERVAL_SECS,
};
use crate::volume::detect_suspicious;

/// Everything the detector suite found in one capture.
///
/// Connections are stored as key/record pairs rather than a map because the
/// composite key does not survive JSON map encoding.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SecurityScan {
    pub connections: Vec<(ConnectionKey, ConnectionRecord)>,
    pub port_scanners: HashMap<IpAddr, ScanRecord>,
    pub syn_flood_targets: HashMap<IpAddr, u64>,
    pub incomplete_connections: Vec<IncompleteConnection>,
    pub icmp_flooders: HashMap<IpAddr, u64>,
    pub dns: DnsFindings,
    pub http_requests: Vec<HttpRequestRecord>,
    pub http_responses: Vec<HttpResponseRecord>,
    pub suspicious_ips: Vec<IpAddr>,
}

/// Run every detector over the decoded capture.
pub fn run_security_scan(
    packets: &[CapturedPacket],
    parsed: &ParseOutput,
    config: &AnalysisConfig,
) -> SecurityScan {
    tracing::info!(packets = packets.len(), "running security scan");

    let connection_map = track_connections(packets);
    let port_scanners = detect_port_scanning(packets, config.port_scan_threshold);
    let (syn_flood_targets, incomplete_connections) =
        detect_syn_flood(&connection_map, config.syn_flood_threshold);
    let icmp_flooders = detect_icmp_flood(packets, config.icmp_flood_threshold);
    let dns = detect_dns_anomalies(
        packets,
        config.dns_length_threshold,
        config.dns_frequency_threshold,
    );
    let (http_requests, http_responses) = extract_http(packets);
    let suspicious_ips = detect_suspicious(&parsed.ip_traffic, &config.volume);

    let mut connections: Vec<(ConnectionKey, ConnectionRecord)> =
        connection_map.into_iter().collect();
    connections.sort_by_key(|(key, _)| *key);

    tracing::info!(
        connections = connections.len(),
        port_scanners = port_scanners.len(),
        syn_flood_targets = syn_flood_targets.len(),
        icmp_flooders = icmp_flooders.len(),
        suspicious_dns = dns.suspicious.len(),
        http_requests = http_requests.len(),
        suspicious_ips = suspicious_ips.len(),
        "security scan complete"
    );

    SecurityScan {
        connections,
        port_scanners,
        syn_flood_targets,
        incomplete_connections,
        icmp_flooders,
        dns,
        http_requests,
        http_responses,
        suspicious_ips,
    }
}

/// Provenance block pinned to the top of every report.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub capsift_version: String,
    pub generated_at: DateTime<Utc>,
    pub pcap_filename: String,
    pub pcap_sha256: String,
    pub pcap_size_bytes: u64,
    pub total_frames: u64,
    pub decoded_packets: u64,
    pub decode_errors: u64,
    pub capture_start: Option<DateTime<Utc>>,
    pub capture_end: Option<DateTime<Utc>>,
}

impl ReportMetadata {
    pub fn from_capture(capture: &Capture) -> Self {
        Self {
            capsift_version: crate::VERSION.to_string(),
            generated_at: Utc::now(),
            pcap_filename: capture.filename.clone(),
            pcap_sha256: capture.file_sha256.clone(),
            pcap_size_bytes: capture.file_size,
            total_frames: capture.total_frames,
            decoded_packets: capture.packets.len() as u64,
            decode_errors: capture.decode_errors,
            capture_start: capture.first_timestamp,
            capture_end: capture.last_timestamp,
        }
    }
}

/// The full analysis output, serialized to `report.json`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metadata: ReportMetadata,
    pub records: Vec<PacketRecord>,
    pub full_protocol_counts: HashMap<String, u64>,
    pub main_protocol_counts: HashMap<String, u64>,
    pub ip_traffic: HashMap<IpAddr, u64>,
    pub scan: SecurityScan,
    pub protocol_stats: HashMap<String, ProtocolSizeStats>,
    pub unusual_protocols: HashMap<String, u64>,
    pub traffic_spikes: Vec<TrafficBucket>,
}

impl AnalysisReport {
    pub fn build(capture: &Capture, parsed: ParseOutput, scan: SecurityScan) -> Self {
        let protocol_stats = protocol_statistics(&parsed.records);
        let unusual_protocols =
            detect_unusual_protocols(&parsed.main_protocol_counts, DEFAULT_PROTOCOL_WHITELIST);
        let traffic_spikes = detect_traffic_spikes(&parsed.records, DEFAULT_SPIKE_INTERVAL_SECS);

        Self {
            metadata: ReportMetadata::from_capture(capture),
            records: parsed.records,
            full_protocol_counts: parsed.full_protocol_counts,
            main_protocol_counts: parsed.main_protocol_counts,
            ip_traffic: parsed.ip_traffic,
            scan,
            protocol_stats,
            unusual_protocols,
            traffic_spikes,
        }
    }
}
