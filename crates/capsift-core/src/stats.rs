use std::collections::HashMap;

use crate::models::{PacketRecord, ProtocolSizeStats, TrafficBucket};

pub const DEFAULT_PROTOCOL_WHITELIST: &[&str] = &[
    "TCP", "UDP", "ICMP", "ARP", "DNS", "HTTP", "HTTPS", "Raw", "Padding",
];

pub const DEFAULT_SPIKE_INTERVAL_SECS: u64 = 1;

/// Well-known port to service label, for presentation of scan reports.
pub fn service_name(port: u16) -> String {
    let known = match port {
        20 => "FTP-DATA",
        21 => "FTP",
        22 => "SSH",
        23 => "Telnet",
        25 => "SMTP",
        53 => "DNS",
        67 => "DHCP-Server",
        68 => "DHCP-Client",
        69 => "TFTP",
        80 => "HTTP",
        110 => "POP3",
        123 => "NTP",
        135 => "MS-RPC",
        137..=139 => "NetBIOS",
        143 => "IMAP",
        161 => "SNMP",
        162 => "SNMP-Trap",
        389 => "LDAP",
        443 => "HTTPS",
        445 => "SMB",
        465 => "SMTPS",
        514 => "Syslog",
        587 => "SMTP-Submit",
        636 => "LDAPS",
        993 => "IMAPS",
        995 => "POP3S",
        1433 => "MS-SQL",
        1521 => "Oracle-DB",
        3306 => "MySQL",
        3389 => "RDP",
        5432 => "PostgreSQL",
        5900 => "VNC",
        6379 => "Redis",
        8080 => "HTTP-Proxy",
        8443 => "HTTPS-Alt",
        27017 => "MongoDB",
        _ => return format!("Port-{port}"),
    };
    known.to_string()
}

/// Main-protocol counts outside the whitelist.
pub fn detect_unusual_protocols(
    main_protocol_counts: &HashMap<String, u64>,
    whitelist: &[&str],
) -> HashMap<String, u64> {
    main_protocol_counts
        .iter()
        .filter(|(proto, _)| !whitelist.contains(&proto.as_str()))
        .map(|(proto, count)| (proto.clone(), *count))
        .collect()
}

/// Per-main-protocol packet size statistics over the record table.
pub fn protocol_statistics(records: &[PacketRecord]) -> HashMap<String, ProtocolSizeStats> {
    let mut grouped: HashMap<&str, Vec<u32>> = HashMap::new();
    for rec in records {
        grouped.entry(&rec.main_protocol).or_default().push(rec.length);
    }

    grouped
        .into_iter()
        .map(|(proto, sizes)| {
            let count = sizes.len() as u64;
            let total: u64 = sizes.iter().map(|&s| s as u64).sum();
            let mean = total as f64 / count as f64;
            let variance = sizes
                .iter()
                .map(|&s| (s as f64 - mean).powi(2))
                .sum::<f64>()
                / count as f64;
            (
                proto.to_string(),
                ProtocolSizeStats {
                    count,
                    total_bytes: total,
                    mean,
                    min: sizes.iter().copied().min().unwrap_or(0),
                    max: sizes.iter().copied().max().unwrap_or(0),
                    std_dev: variance.sqrt(),
                },
            )
        })
        .collect()
}

/// Bucket the capture into fixed intervals and flag buckets whose packet
/// count exceeds mean + 3 standard deviations.
pub fn detect_traffic_spikes(records: &[PacketRecord], interval_secs: u64) -> Vec<TrafficBucket> {
    if records.is_empty() || interval_secs == 0 {
        return Vec::new();
    }

    let interval = interval_secs as f64;
    let mut buckets: HashMap<i64, (u64, u64)> = HashMap::new();
    for rec in records {
        let slot = (rec.timestamp / interval).floor() as i64;
        let entry = buckets.entry(slot).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += rec.length as u64;
    }

    let mut timeline: Vec<TrafficBucket> = buckets
        .into_iter()
        .map(|(slot, (packets, bytes))| TrafficBucket {
            start: slot as f64 * interval,
            packets,
            bytes,
            is_spike: false,
        })
        .collect();
    timeline.sort_by(|a, b| a.start.total_cmp(&b.start));

    let n = timeline.len() as f64;
    let mean = timeline.iter().map(|b| b.packets as f64).sum::<f64>() / n;
    let variance = timeline
        .iter()
        .map(|b| (b.packets as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    let cutoff = mean + 3.0 * variance.sqrt();

    for bucket in &mut timeline {
        bucket.is_spike = bucket.packets as f64 > cutoff;
    }
    timeline
}
