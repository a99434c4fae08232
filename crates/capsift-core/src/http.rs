use std::borrow::Cow;

use crate::models::{HttpRequestRecord, HttpResponseRecord};
use crate::packet::CapturedPacket;

const METHODS: &[&str] = &["GET ", "POST ", "PUT ", "DELETE ", "HEAD "];

/// Best-effort extraction of HTTP request and status lines from TCP payloads.
///
/// Each packet is inspected in isolation; anything that does not parse is
/// skipped and never aborts the extraction.
pub fn extract_http(
    packets: &[CapturedPacket],
) -> (Vec<HttpRequestRecord>, Vec<HttpResponseRecord>) {
    let mut requests = Vec::new();
    let mut responses = Vec::new();

    for pkt in packets {
        if !pkt.has_tcp() {
            continue;
        }
        let payload = match pkt.payload() {
            Some(p) if !p.is_empty() => p,
            _ => continue,
        };

        let text = decode_payload(payload);

        if METHODS.iter().any(|m| text.starts_with(m)) {
            if let Some((method, url, version)) = parse_request_line(&text) {
                requests.push(HttpRequestRecord {
                    src_ip: pkt.network_src(),
                    dst_ip: pkt.network_dst(),
                    method,
                    url,
                    version,
                    timestamp: pkt.epoch_secs(),
                });
            }
        } else if text.starts_with("HTTP/") {
            if let Some(status_code) = parse_status_line(&text) {
                responses.push(HttpResponseRecord {
                    src_ip: pkt.network_src(),
                    dst_ip: pkt.network_dst(),
                    status_code,
                    timestamp: pkt.epoch_secs(),
                });
            }
        }
    }

    tracing::debug!(
        requests = requests.len(),
        responses = responses.len(),
        "http extraction complete"
    );
    (requests, responses)
}

/// Lossy text decode: undecodable bytes are replaced, never an error.
fn decode_payload(data: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(data)
}

/// First CRLF-terminated line must be exactly method, URL, version.
fn parse_request_line(text: &str) -> Option<(String, String, String)> {
    let first_line = text.split("\r\n").next()?;
    let tokens: Vec<&str> = first_line.split_whitespace().collect();
    if tokens.len() != 3 {
        return None;
    }
    Some((
        tokens[0].to_string(),
        tokens[1].to_string(),
        tokens[2].to_string(),
    ))
}

/// Status line needs at least version and a numeric status code.
fn parse_status_line(text: &str) -> Option<u16> {
    let first_line = text.split("\r\n").next()?;
    let mut tokens = first_line.split_whitespace();
    let _version = tokens.next()?;
    tokens.next()?.parse().ok()
}
