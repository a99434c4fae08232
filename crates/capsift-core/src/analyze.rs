use std::collections::HashMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::models::PacketRecord;
use crate::packet::CapturedPacket;

/// Everything the single parse pass produces: the per-packet record table
/// plus the three aggregate counters. Built fresh per analysis run, no
/// process-wide state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseOutput {
    pub records: Vec<PacketRecord>,
    /// Full protocol chain string ("Ethernet -> IP -> TCP -> Raw") -> count.
    pub full_protocol_counts: HashMap<String, u64>,
    /// Innermost layer name -> count.
    pub main_protocol_counts: HashMap<String, u64>,
    /// Cumulative bytes per address, counted once per side present.
    pub ip_traffic: HashMap<IpAddr, u64>,
}

impl ParseOutput {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Walk the packet sequence once, producing the record table and counters.
///
/// A packet with both addresses present contributes its length to both
/// entries; a loopback packet (src == dst) contributes twice to the same one.
pub fn parse_packets(packets: &[CapturedPacket]) -> ParseOutput {
    let mut out = ParseOutput::default();

    for pkt in packets {
        let src_ip = pkt.src_addr();
        let dst_ip = pkt.dst_addr();
        let (src_port, dst_port) = match pkt.transport_ports() {
            Some((s, d)) => (Some(s), Some(d)),
            None => (None, None),
        };

        let full_protocol = pkt.protocol_chain();
        let main_protocol = pkt.main_protocol().to_string();

        *out.full_protocol_counts
            .entry(full_protocol.clone())
            .or_insert(0) += 1;
        *out.main_protocol_counts
            .entry(main_protocol.clone())
            .or_insert(0) += 1;

        if let Some(ip) = src_ip {
            *out.ip_traffic.entry(ip).or_insert(0) += pkt.length as u64;
        }
        if let Some(ip) = dst_ip {
            *out.ip_traffic.entry(ip).or_insert(0) += pkt.length as u64;
        }

        out.records.push(PacketRecord {
            timestamp: pkt.epoch_secs(),
            src_ip,
            dst_ip,
            src_port,
            dst_port,
            main_protocol,
            full_protocol,
            length: pkt.length,
        });
    }

    tracing::debug!(
        packets = out.records.len(),
        protocols = out.main_protocol_counts.len(),
        hosts = out.ip_traffic.len(),
        "parse pass complete"
    );

    out
}
