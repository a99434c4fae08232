use std::collections::HashMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::models::{DnsQueryRecord, SuspiciousDnsRecord};
use crate::packet::{CapturedPacket, DnsMessage};

pub const DEFAULT_DNS_LENGTH_THRESHOLD: usize = 50;
pub const DEFAULT_DNS_FREQUENCY_THRESHOLD: u64 = 100;

pub const LONG_NAME_REASON: &str = "unusually long domain name (potential tunneling)";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsFindings {
    pub queries: Vec<DnsQueryRecord>,
    pub suspicious: Vec<SuspiciousDnsRecord>,
    /// Sources whose query count strictly exceeds the frequency threshold.
    pub high_frequency: HashMap<IpAddr, u64>,
}

/// Scan the capture for DNS queries and flag tunneling-shaped anomalies.
///
/// Only queries (QR bit clear) with a network layer count; a message whose
/// question section is missing is skipped, not fatal.
pub fn detect_dns_anomalies(
    packets: &[CapturedPacket],
    length_threshold: usize,
    frequency_threshold: u64,
) -> DnsFindings {
    let mut findings = DnsFindings::default();
    let mut per_source: HashMap<IpAddr, u64> = HashMap::new();

    for pkt in packets {
        let msg = match pkt.dns() {
            Some(m) if !m.is_response => m,
            _ => continue,
        };
        let src_ip = match pkt.network_src() {
            Some(ip) => ip,
            None => continue,
        };
        let query_name = match &msg.query_name {
            Some(name) => name.clone(),
            None => continue,
        };

        let name_length = query_name.len();
        if name_length > length_threshold {
            findings.suspicious.push(SuspiciousDnsRecord {
                src_ip,
                query_name: query_name.clone(),
                reason: LONG_NAME_REASON.to_string(),
            });
        }

        *per_source.entry(src_ip).or_insert(0) += 1;
        findings.queries.push(DnsQueryRecord {
            src_ip,
            query_name,
            name_length,
        });
    }

    findings.high_frequency = per_source
        .into_iter()
        .filter(|(_, count)| *count > frequency_threshold)
        .collect();

    tracing::debug!(
        queries = findings.queries.len(),
        suspicious = findings.suspicious.len(),
        high_frequency = findings.high_frequency.len(),
        "dns anomaly pass complete"
    );
    findings
}

// ---------------------------------------------------------------------------
// Wire-level query parsing, used when decoding port-53 payloads
// ---------------------------------------------------------------------------

/// Parse the DNS header and first question of a message. Returns None when
/// the bytes do not look like a DNS message at all; a well-formed header
/// with no question yields a message without a query name.
pub fn parse_dns_message(data: &[u8]) -> Option<DnsMessage> {
    if data.len() < 12 {
        return None;
    }

    let flags = u16::from_be_bytes([data[2], data[3]]);
    let is_response = (flags & 0x8000) != 0;
    let qdcount = u16::from_be_bytes([data[4], data[5]]);

    let query_name = if qdcount > 0 {
        read_dns_name(data, 12).map(|(name, _)| name)
    } else {
        None
    };

    Some(DnsMessage {
        is_response,
        query_name,
    })
}

fn read_dns_name(data: &[u8], mut offset: usize) -> Option<(String, usize)> {
    let mut parts: Vec<String> = Vec::new();
    let mut jumped = false;
    let mut return_offset = 0;
    let mut seen = 0;

    loop {
        if offset >= data.len() || seen > 256 {
            return None;
        }
        seen += 1;

        let len = data[offset] as usize;

        if len == 0 {
            if !jumped {
                return_offset = offset + 1;
            }
            break;
        }

        // Compression pointer
        if len & 0xC0 == 0xC0 {
            if offset + 1 >= data.len() {
                return None;
            }
            let ptr = ((len & 0x3F) << 8) | (data[offset + 1] as usize);
            if !jumped {
                return_offset = offset + 2;
            }
            offset = ptr;
            jumped = true;
            continue;
        }

        offset += 1;
        if offset + len > data.len() {
            return None;
        }

        parts.push(String::from_utf8_lossy(&data[offset..offset + len]).to_string());
        offset += len;
    }

    if parts.is_empty() {
        return None;
    }

    Some((parts.join("."), return_offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn test_parse_dns_query_message() {
        let data: Vec<u8> = vec![
            0x00, 0x01, // transaction id
            0x01, 0x00, // flags: standard query
            0x00, 0x01, // qdcount
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // an/ns/ar
            0x07, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0x03, b'c', b'o', b'm',
            0x00, // root label
            0x00, 0x01, 0x00, 0x01, // type A, class IN
        ];

        let msg = parse_dns_message(&data).unwrap();
        assert!(!msg.is_response);
        assert_eq!(msg.query_name.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_parse_dns_response_flag() {
        let data: Vec<u8> = vec![
            0x00, 0x01, 0x81, 0x80, // flags: response
            0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07, b'e', b'x', b'a', b'm', b'p',
            b'l', b'e', 0x03, b'c', b'o', b'm', 0x00, 0x00, 0x01, 0x00, 0x01,
        ];

        let msg = parse_dns_message(&data).unwrap();
        assert!(msg.is_response);
    }

    #[test]
    fn test_parse_dns_message_without_question() {
        let data: Vec<u8> = vec![
            0x00, 0x01, 0x01, 0x00, 0x00, 0x00, // qdcount = 0
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];

        let msg = parse_dns_message(&data).unwrap();
        assert_eq!(msg.query_name, None);
    }

    #[test]
    fn test_parse_dns_message_too_short() {
        assert!(parse_dns_message(&[0x00, 0x01, 0x01]).is_none());
    }

    #[test]
    fn test_long_query_name_flagged() {
        let long_name = format!("{}.evil.example", "a".repeat(48));
        assert!(long_name.len() > 50);

        let packets = vec![
            testutil::dns_query_packet(0, 1.0, "10.0.0.5", "8.8.8.8", Some(&long_name), 120),
            testutil::dns_query_packet(1, 1.1, "10.0.0.5", "8.8.8.8", Some("example.com"), 74),
        ];

        let findings = detect_dns_anomalies(&packets, 50, 100);
        assert_eq!(findings.queries.len(), 2);
        assert_eq!(findings.suspicious.len(), 1);
        assert_eq!(findings.suspicious[0].query_name, long_name);
        assert_eq!(findings.suspicious[0].reason, LONG_NAME_REASON);
    }

    #[test]
    fn test_responses_and_missing_questions_skipped() {
        let packets = vec![
            testutil::dns_response_packet(0, 1.0, "8.8.8.8", "10.0.0.5", "example.com", 90),
            testutil::dns_query_packet(1, 1.1, "10.0.0.5", "8.8.8.8", None, 60),
        ];

        let findings = detect_dns_anomalies(&packets, 50, 100);
        assert!(findings.queries.is_empty());
        assert!(findings.suspicious.is_empty());
    }

    #[test]
    fn test_high_frequency_is_strictly_greater() {
        let at_threshold: Vec<_> = (0..100)
            .map(|i| {
                testutil::dns_query_packet(i, 1.0 + i as f64, "10.0.0.5", "8.8.8.8",
                    Some("example.com"), 74)
            })
            .collect();
        let findings = detect_dns_anomalies(&at_threshold, 50, 100);
        assert!(findings.high_frequency.is_empty());

        let mut over = at_threshold;
        over.push(testutil::dns_query_packet(
            100, 200.0, "10.0.0.5", "8.8.8.8", Some("example.com"), 74,
        ));
        let findings = detect_dns_anomalies(&over, 50, 100);
        assert_eq!(findings.high_frequency[&"10.0.0.5".parse().unwrap()], 101);
    }
}
