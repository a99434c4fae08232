use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use crate::models::{ConnectionKey, ConnectionRecord, IncompleteConnection, ScanRecord, TransportProto};
use crate::packet::CapturedPacket;

pub const DEFAULT_PORT_SCAN_THRESHOLD: usize = 10;
pub const DEFAULT_SYN_FLOOD_THRESHOLD: u64 = 20;
pub const DEFAULT_ICMP_FLOOD_THRESHOLD: u64 = 50;

const PORT_SAMPLE_CAP: usize = 20;

/// Flag sources that contacted at least `threshold` distinct
/// (transport, destination port) pairs across the capture.
pub fn detect_port_scanning(
    packets: &[CapturedPacket],
    threshold: usize,
) -> HashMap<IpAddr, ScanRecord> {
    let mut contacted: HashMap<IpAddr, HashSet<(TransportProto, u16)>> = HashMap::new();

    for pkt in packets {
        let src = match pkt.network_src() {
            Some(ip) => ip,
            None => continue,
        };
        let (_, dst_port) = match pkt.transport_ports() {
            Some(p) => p,
            None => continue,
        };
        let proto = if pkt.has_tcp() {
            TransportProto::Tcp
        } else {
            TransportProto::Udp
        };
        contacted.entry(src).or_default().insert((proto, dst_port));
    }

    let mut scanners = HashMap::new();
    for (ip, pairs) in contacted {
        if pairs.len() >= threshold {
            let mut sample: Vec<(TransportProto, u16)> = pairs.into_iter().collect();
            sample.sort_by_key(|(proto, port)| (*port, *proto));
            let port_count = sample.len();
            sample.truncate(PORT_SAMPLE_CAP);
            scanners.insert(
                ip,
                ScanRecord {
                    port_count,
                    sampled_ports: sample,
                },
            );
        }
    }

    if !scanners.is_empty() {
        tracing::info!(scanners = scanners.len(), "port scan sources flagged");
    }
    scanners
}

/// Sum SYN counts of never-completed connections per destination; flag
/// destinations at or over the threshold. Read-only over tracker output;
/// the raw incomplete-connection list is returned for forensic detail.
pub fn detect_syn_flood(
    connections: &HashMap<ConnectionKey, ConnectionRecord>,
    threshold: u64,
) -> (HashMap<IpAddr, u64>, Vec<IncompleteConnection>) {
    let mut incomplete = Vec::new();
    for (key, conn) in connections {
        if conn.syn_count > 0 && !conn.handshake_complete {
            incomplete.push(IncompleteConnection {
                src_ip: key.src_ip,
                src_port: key.src_port,
                dst_ip: key.dst_ip,
                dst_port: key.dst_port,
                syn_count: conn.syn_count,
            });
        }
    }

    let mut per_target: HashMap<IpAddr, u64> = HashMap::new();
    for conn in &incomplete {
        *per_target.entry(conn.dst_ip).or_insert(0) += conn.syn_count;
    }

    let targets: HashMap<IpAddr, u64> = per_target
        .into_iter()
        .filter(|(_, count)| *count >= threshold)
        .collect();

    if !targets.is_empty() {
        tracing::info!(targets = targets.len(), "syn flood targets flagged");
    }
    (targets, incomplete)
}

/// Count ICMP packets per source; flag sources at or over the threshold.
pub fn detect_icmp_flood(packets: &[CapturedPacket], threshold: u64) -> HashMap<IpAddr, u64> {
    let mut counts: HashMap<IpAddr, u64> = HashMap::new();

    for pkt in packets {
        if pkt.icmp().is_none() {
            continue;
        }
        if let Some(src) = pkt.network_src() {
            *counts.entry(src).or_insert(0) += 1;
        }
    }

    let flooders: HashMap<IpAddr, u64> = counts
        .into_iter()
        .filter(|(_, count)| *count >= threshold)
        .collect();

    if !flooders.is_empty() {
        tracing::info!(sources = flooders.len(), "icmp flood sources flagged");
    }
    flooders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connections::track_connections;
    use crate::testutil;

    #[test]
    fn test_port_scan_threshold_boundary() {
        // exactly `threshold` distinct pairs -> flagged
        let packets: Vec<_> = (0..10)
            .map(|i| {
                testutil::tcp_packet(
                    i,
                    1.0,
                    "10.0.0.9",
                    40000,
                    "10.0.0.2",
                    1000 + i as u16,
                    0x02,
                    60,
                    b"",
                )
            })
            .collect();
        let scanners = detect_port_scanning(&packets, 10);
        let rec = &scanners[&"10.0.0.9".parse().unwrap()];
        assert_eq!(rec.port_count, 10);

        // threshold - 1 distinct pairs -> not flagged
        let scanners = detect_port_scanning(&packets[..9], 10);
        assert!(scanners.is_empty());
    }

    #[test]
    fn test_port_scan_mixed_transports_are_distinct_pairs() {
        // Same port over TCP and UDP counts as two pairs.
        let mut packets = Vec::new();
        for i in 0..5u16 {
            packets.push(testutil::tcp_packet(
                i as u64, 1.0, "10.0.0.9", 40000, "10.0.0.2", 1000 + i, 0x02, 60, b"",
            ));
            packets.push(testutil::udp_packet(
                (5 + i) as u64, 1.0, "10.0.0.9", 40000, "10.0.0.2", 1000 + i, 60, b"x",
            ));
        }
        let scanners = detect_port_scanning(&packets, 10);
        assert_eq!(scanners[&"10.0.0.9".parse().unwrap()].port_count, 10);
    }

    #[test]
    fn test_port_scan_sample_sorted_and_capped() {
        let packets: Vec<_> = (0..30)
            .map(|i| {
                testutil::tcp_packet(
                    i,
                    1.0,
                    "10.0.0.9",
                    40000,
                    "10.0.0.2",
                    // descending destination ports
                    2000 - i as u16,
                    0x02,
                    60,
                    b"",
                )
            })
            .collect();

        let scanners = detect_port_scanning(&packets, 10);
        let rec = &scanners[&"10.0.0.9".parse().unwrap()];
        assert_eq!(rec.port_count, 30);
        assert_eq!(rec.sampled_ports.len(), 20);
        assert_eq!(rec.sampled_ports[0].1, 1971);
        assert!(rec
            .sampled_ports
            .windows(2)
            .all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn test_syn_flood_scenario() {
        // 30 SYN-only packets from one source to one destination port.
        let packets: Vec<_> = (0..30)
            .map(|i| {
                testutil::tcp_packet(
                    i,
                    1.0 + i as f64 * 0.001,
                    "10.0.0.9",
                    40000 + i as u16,
                    "10.0.0.2",
                    80,
                    0x02,
                    60,
                    b"",
                )
            })
            .collect();

        let conns = track_connections(&packets);
        let (targets, incomplete) = detect_syn_flood(&conns, 20);

        assert_eq!(incomplete.len(), 30);
        assert_eq!(targets[&"10.0.0.2".parse().unwrap()], 30);

        // Same capture, one destination port: not a port scan.
        let scanners = detect_port_scanning(&packets, 10);
        assert!(scanners.is_empty());
    }

    #[test]
    fn test_syn_flood_completed_handshakes_excluded() {
        let mut packets = Vec::new();
        // A completed connection: SYN then ACK on the same key.
        packets.push(testutil::tcp_packet(
            0, 1.0, "10.0.0.1", 4000, "10.0.0.2", 80, 0x02, 60, b"",
        ));
        packets.push(testutil::tcp_packet(
            1, 1.1, "10.0.0.1", 4000, "10.0.0.2", 80, 0x10, 52, b"",
        ));
        // An incomplete one from another source.
        packets.push(testutil::tcp_packet(
            2, 1.2, "10.0.0.7", 4001, "10.0.0.2", 80, 0x02, 60, b"",
        ));

        let conns = track_connections(&packets);
        let (targets, incomplete) = detect_syn_flood(&conns, 1);
        assert_eq!(incomplete.len(), 1);
        assert_eq!(incomplete[0].src_ip, "10.0.0.7".parse::<IpAddr>().unwrap());
        assert_eq!(targets[&"10.0.0.2".parse().unwrap()], 1);
    }

    #[test]
    fn test_icmp_flood_threshold_inclusive() {
        let packets: Vec<_> = (0..50)
            .map(|i| testutil::icmp_packet(i, 1.0 + i as f64 * 0.01, "10.0.0.3", "10.0.0.2", 98))
            .collect();

        let flooders = detect_icmp_flood(&packets, 50);
        assert_eq!(flooders[&"10.0.0.3".parse().unwrap()], 50);

        let flooders = detect_icmp_flood(&packets[..49], 50);
        assert!(flooders.is_empty());
    }
}
