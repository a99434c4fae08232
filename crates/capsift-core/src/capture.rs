use std::fs::File;
use std::io::Read;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::*;
use sha2::{Digest, Sha256};

use crate::dns::parse_dns_message;
use crate::packet::{CapturedPacket, Layer, TcpFlags};

const DNS_PORT: u16 = 53;

// ---------------------------------------------------------------------------
// Capture: a fully loaded pcap/pcapng file as a sequence of decoded packets
// ---------------------------------------------------------------------------

pub struct Capture {
    pub filename: String,
    pub file_sha256: String,
    pub file_size: u64,
    /// Frames present in the file, decoded or not.
    pub total_frames: u64,
    /// Frames that could not be decoded into a layer stack; skipped, never fatal.
    pub decode_errors: u64,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub packets: Vec<CapturedPacket>,
    linktype: Linktype,
}

impl Capture {
    /// An empty capture: the "nothing to analyze" input.
    pub fn empty(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            file_sha256: String::new(),
            file_size: 0,
            total_frames: 0,
            decode_errors: 0,
            first_timestamp: None,
            last_timestamp: None,
            packets: Vec::new(),
            linktype: Linktype::ETHERNET,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let file_size = std::fs::metadata(path)
            .with_context(|| format!("cannot stat {}", path.display()))?
            .len();
        let file_sha256 = compute_file_sha256(path)?;

        tracing::info!(file = %filename, size = file_size, sha256 = %file_sha256, "loading capture");

        let mut file =
            File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .with_context(|| format!("cannot read {}", path.display()))?;

        let mut capture = Self::empty(filename);
        capture.file_sha256 = file_sha256;
        capture.file_size = file_size;

        let is_pcapng = buf.len() >= 4 && buf[..4] == [0x0a, 0x0d, 0x0d, 0x0a];
        if is_pcapng {
            capture.read_pcapng(&buf)?;
        } else {
            capture.read_pcap(&buf)?;
        }

        tracing::info!(
            frames = capture.total_frames,
            decoded = capture.packets.len(),
            errors = capture.decode_errors,
            "capture loaded"
        );

        Ok(capture)
    }

    /// Load a capture, treating a missing or unreadable file as empty input.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::from_file(path) {
            Ok(capture) => capture,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "capture unreadable, treating as empty");
                Self::empty(path.to_string_lossy())
            }
        }
    }

    fn read_pcap(&mut self, data: &[u8]) -> Result<()> {
        let mut reader =
            LegacyPcapReader::new(65536, data).context("failed to create pcap reader")?;

        loop {
            match reader.next() {
                Ok((consumed, block)) => {
                    match block {
                        PcapBlockOwned::LegacyHeader(header) => {
                            self.linktype = header.network;
                        }
                        PcapBlockOwned::Legacy(packet) => {
                            let ts = pcap_ts_to_datetime(packet.ts_sec as i64, packet.ts_usec);
                            self.ingest_frame(&packet.data, ts, packet.origlen);
                        }
                        _ => {}
                    }
                    reader.consume(consumed);
                }
                Err(PcapError::Eof) => break,
                Err(PcapError::Incomplete(_)) => {
                    // whole file is already in memory, truncated trailing frame
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "pcap read error");
                    self.decode_errors += 1;
                    break;
                }
            }
        }
        Ok(())
    }

    fn read_pcapng(&mut self, data: &[u8]) -> Result<()> {
        let mut reader =
            PcapNGReader::new(65536, data).context("failed to create pcapng reader")?;
        let mut if_tsresol: u64 = 1_000_000;

        loop {
            match reader.next() {
                Ok((consumed, block)) => {
                    match block {
                        PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
                            self.linktype = idb.linktype;
                            for opt in &idb.options {
                                if opt.code == OptionCode::IfTsresol {
                                    if let Some(&val) = opt.value.first() {
                                        if val & 0x80 != 0 {
                                            if_tsresol = 2u64.pow((val & 0x7f) as u32);
                                        } else {
                                            if_tsresol = 10u64.pow(val as u32);
                                        }
                                    }
                                }
                            }
                        }
                        PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                            let ts_raw = ((epb.ts_high as u64) << 32) | (epb.ts_low as u64);
                            let secs = (ts_raw / if_tsresol) as i64;
                            let frac = ts_raw % if_tsresol;
                            let usecs = (frac * 1_000_000 / if_tsresol) as u32;
                            let ts = pcap_ts_to_datetime(secs, usecs);
                            self.ingest_frame(&epb.data, ts, epb.origlen);
                        }
                        PcapBlockOwned::NG(Block::SimplePacket(spb)) => {
                            let len = spb.data.len() as u32;
                            self.ingest_frame(&spb.data, Utc::now(), len);
                        }
                        _ => {}
                    }
                    reader.consume(consumed);
                }
                Err(PcapError::Eof) => break,
                Err(PcapError::Incomplete(_)) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "pcapng read error");
                    self.decode_errors += 1;
                    break;
                }
            }
        }
        Ok(())
    }

    fn ingest_frame(&mut self, data: &[u8], timestamp: DateTime<Utc>, origlen: u32) {
        let index = self.total_frames;
        self.total_frames += 1;

        match decode_frame(self.linktype, data) {
            Some(layers) => {
                if self.first_timestamp.is_none() || Some(timestamp) < self.first_timestamp {
                    self.first_timestamp = Some(timestamp);
                }
                if self.last_timestamp.is_none() || Some(timestamp) > self.last_timestamp {
                    self.last_timestamp = Some(timestamp);
                }
                self.packets.push(CapturedPacket {
                    index,
                    timestamp,
                    length: origlen,
                    layers,
                });
            }
            None => {
                self.decode_errors += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Frame decoding: raw bytes -> layer stack
// ---------------------------------------------------------------------------

fn decode_frame(linktype: Linktype, data: &[u8]) -> Option<Vec<Layer>> {
    match linktype {
        Linktype::ETHERNET => decode_ethernet(data),
        Linktype::RAW | Linktype(12) => decode_ip(data, Vec::new()),
        Linktype::NULL => {
            // BSD loopback: 4-byte family header
            if data.len() < 4 {
                return None;
            }
            decode_ip(&data[4..], Vec::new())
        }
        Linktype::LINUX_SLL => {
            // Linux cooked capture: 16-byte header
            if data.len() < 16 {
                return None;
            }
            decode_ip(&data[16..], Vec::new())
        }
        _ => None,
    }
}

fn decode_ethernet(data: &[u8]) -> Option<Vec<Layer>> {
    if data.len() < 14 {
        return None;
    }

    let mut ethertype = u16::from_be_bytes([data[12], data[13]]);
    let mut offset = 14usize;

    // 802.1Q VLAN tags, including QinQ
    while ethertype == 0x8100 {
        if data.len() < offset + 4 {
            return None;
        }
        ethertype = u16::from_be_bytes([data[offset + 2], data[offset + 3]]);
        offset += 4;
    }

    let layers = vec![Layer::Ethernet];
    let rest = &data[offset..];

    match ethertype {
        0x0800 | 0x86DD => decode_ip(rest, layers),
        0x0806 => decode_arp(rest, layers),
        _ => {
            // Undissected ethertype: keep the packet, expose bytes as payload
            let mut layers = layers;
            if !rest.is_empty() {
                layers.push(Layer::Payload(rest.to_vec()));
            }
            Some(layers)
        }
    }
}

fn decode_arp(data: &[u8], mut layers: Vec<Layer>) -> Option<Vec<Layer>> {
    // htype(2) ptype(2) hlen(1) plen(1) oper(2) sha(6) spa(4) tha(6) tpa(4)
    if data.len() < 28 {
        return None;
    }
    let sender_ip = Ipv4Addr::new(data[14], data[15], data[16], data[17]);
    let target_ip = Ipv4Addr::new(data[24], data[25], data[26], data[27]);
    layers.push(Layer::Arp {
        sender_ip,
        target_ip,
    });
    Some(layers)
}

fn decode_ip(data: &[u8], mut layers: Vec<Layer>) -> Option<Vec<Layer>> {
    use etherparse::{NetHeaders, PacketHeaders, TransportHeader};

    let headers = match PacketHeaders::from_ip_slice(data) {
        Ok(h) => h,
        Err(_) => {
            // Not decodable as IP; keep the bytes as an opaque payload
            if !data.is_empty() {
                layers.push(Layer::Payload(data.to_vec()));
            }
            return Some(layers);
        }
    };

    match headers.net {
        Some(NetHeaders::Ipv4(ref h, _)) => layers.push(Layer::Ipv4 {
            src: Ipv4Addr::from(h.source),
            dst: Ipv4Addr::from(h.destination),
            ttl: h.time_to_live,
        }),
        Some(NetHeaders::Ipv6(ref h, _)) => layers.push(Layer::Ipv6 {
            src: Ipv6Addr::from(h.source),
            dst: Ipv6Addr::from(h.destination),
            hop_limit: h.hop_limit,
        }),
        None => return None,
    }

    let payload = headers.payload.slice();

    match headers.transport {
        Some(TransportHeader::Tcp(ref tcp)) => {
            layers.push(Layer::Tcp {
                src_port: tcp.source_port,
                dst_port: tcp.destination_port,
                flags: TcpFlags {
                    fin: tcp.fin,
                    syn: tcp.syn,
                    rst: tcp.rst,
                    psh: tcp.psh,
                    ack: tcp.ack,
                    urg: tcp.urg,
                    ece: tcp.ece,
                    cwr: tcp.cwr,
                },
            });
            attach_app_layer(&mut layers, tcp.source_port, tcp.destination_port, payload);
        }
        Some(TransportHeader::Udp(ref udp)) => {
            layers.push(Layer::Udp {
                src_port: udp.source_port,
                dst_port: udp.destination_port,
            });
            attach_app_layer(&mut layers, udp.source_port, udp.destination_port, payload);
        }
        Some(TransportHeader::Icmpv4(ref icmp)) => {
            // Icmpv4Type has no type_u8/code_u8 accessors; the serialized
            // header starts with the raw type and code bytes.
            let header_bytes = icmp.to_bytes();
            layers.push(Layer::Icmp {
                icmp_type: header_bytes[0],
                code: header_bytes[1],
            });
            if !payload.is_empty() {
                layers.push(Layer::Payload(payload.to_vec()));
            }
        }
        Some(TransportHeader::Icmpv6(ref icmp)) => {
            layers.push(Layer::Icmp {
                icmp_type: icmp.icmp_type.type_u8(),
                code: icmp.icmp_type.code_u8(),
            });
            if !payload.is_empty() {
                layers.push(Layer::Payload(payload.to_vec()));
            }
        }
        None => {
            if !payload.is_empty() {
                layers.push(Layer::Payload(payload.to_vec()));
            }
        }
    }

    Some(layers)
}

/// Dissect DNS on port 53; otherwise keep the raw payload.
fn attach_app_layer(layers: &mut Vec<Layer>, src_port: u16, dst_port: u16, payload: &[u8]) {
    if payload.is_empty() {
        return;
    }
    if src_port == DNS_PORT || dst_port == DNS_PORT {
        if let Some(msg) = parse_dns_message(payload) {
            layers.push(Layer::Dns(msg));
            return;
        }
    }
    layers.push(Layer::Payload(payload.to_vec()));
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn pcap_ts_to_datetime(secs: i64, usecs: u32) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, usecs * 1000).unwrap_or_default()
}

fn compute_file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
