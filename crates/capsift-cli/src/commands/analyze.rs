use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use capsift_core::analyze::parse_packets;
use capsift_core::capture::Capture;
use capsift_core::config::AnalysisConfig;
use capsift_core::report::{run_security_scan, AnalysisReport};
use capsift_core::stats::service_name;
use capsift_core::volume::{VolumeThreshold, DEFAULT_ADAPTIVE_FACTOR};

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Path to the PCAP or PCAPNG file
    pub pcap: PathBuf,

    /// Output directory for report.json
    #[arg(short, long, default_value = "report")]
    pub out: PathBuf,

    /// JSON config file with detector thresholds
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Static volume threshold in bytes (overrides config)
    #[arg(long)]
    pub threshold: Option<u64>,

    /// Use an adaptive volume threshold (multiple of mean host traffic)
    #[arg(long, default_value_t = false)]
    pub adaptive: bool,

    /// Multiplier for the adaptive threshold
    #[arg(long)]
    pub factor: Option<f64>,

    /// How many top talkers to print
    #[arg(long, default_value_t = 15)]
    pub top: usize,
}

fn load_config(args: &AnalyzeArgs) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => match AnalysisConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "config unusable, using defaults");
                AnalysisConfig::default()
            }
        },
        None => AnalysisConfig::default(),
    };

    if args.adaptive {
        config.volume =
            VolumeThreshold::adaptive(args.factor.unwrap_or(DEFAULT_ADAPTIVE_FACTOR))?;
    } else if let Some(bytes) = args.threshold {
        config.volume = VolumeThreshold::static_bytes(bytes);
    }

    config.validate()?;
    Ok(config)
}

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let started = Instant::now();
    let config = load_config(&args)?;

    // 1. Load and decode the capture
    println!(
        "  {} {}",
        console::style("[1/4] loading capture").cyan().bold(),
        args.pcap.display(),
    );

    let capture = Capture::load_or_empty(&args.pcap);

    println!(
        "        {} frames decoded, {} errors, sha256:{}",
        console::style(capture.packets.len()).green().bold(),
        capture.decode_errors,
        if capture.file_sha256.len() >= 16 {
            &capture.file_sha256[..16]
        } else {
            "-"
        },
    );

    if capture.packets.is_empty() {
        println!(
            "  {} nothing to analyze in this file",
            console::style("warning:").yellow().bold(),
        );
        return Ok(());
    }

    // 2. Record table + aggregate counters
    println!(
        "  {}",
        console::style("[2/4] building record table").cyan().bold(),
    );

    let parsed = parse_packets(&capture.packets);

    let mut protocols: Vec<_> = parsed.main_protocol_counts.iter().collect();
    protocols.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (proto, count) in &protocols {
        println!(
            "        {}: {} packets",
            console::style(proto).cyan(),
            count,
        );
    }

    let mut talkers: Vec<_> = parsed.ip_traffic.iter().collect();
    talkers.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    println!(
        "        top talkers ({} of {} hosts):",
        args.top.min(talkers.len()),
        talkers.len(),
    );
    for (ip, bytes) in talkers.iter().take(args.top) {
        println!(
            "          {} {} bytes",
            console::style(ip).green(),
            bytes,
        );
    }

    // 3. Detector suite
    println!(
        "  {}",
        console::style("[3/4] running detectors").cyan().bold(),
    );

    let scan = run_security_scan(&capture.packets, &parsed, &config);

    if !scan.suspicious_ips.is_empty() {
        println!(
            "        {} {}",
            console::style("HIGH-VOLUME HOSTS:").red().bold(),
            console::style(scan.suspicious_ips.len()).red().bold(),
        );
        for ip in &scan.suspicious_ips {
            println!(
                "          {} ({} bytes)",
                console::style(ip).red(),
                parsed.ip_traffic.get(ip).copied().unwrap_or(0),
            );
        }
    }

    if !scan.port_scanners.is_empty() {
        println!(
            "        {} {}",
            console::style("PORT SCANNERS:").red().bold(),
            console::style(scan.port_scanners.len()).red().bold(),
        );
        for (ip, rec) in &scan.port_scanners {
            let sample: Vec<String> = rec
                .sampled_ports
                .iter()
                .take(5)
                .map(|(_, port)| service_name(*port))
                .collect();
            println!(
                "          {} touched {} ports ({}, ...)",
                console::style(ip).red(),
                rec.port_count,
                sample.join(", "),
            );
        }
    }

    if !scan.syn_flood_targets.is_empty() {
        println!(
            "        {} {}",
            console::style("SYN FLOOD TARGETS:").red().bold(),
            console::style(scan.syn_flood_targets.len()).red().bold(),
        );
        for (ip, count) in &scan.syn_flood_targets {
            println!(
                "          {} ({} unanswered SYNs)",
                console::style(ip).red(),
                count,
            );
        }
    }

    if !scan.icmp_flooders.is_empty() {
        println!(
            "        {} {}",
            console::style("ICMP FLOODERS:").red().bold(),
            console::style(scan.icmp_flooders.len()).red().bold(),
        );
        for (ip, count) in &scan.icmp_flooders {
            println!(
                "          {} ({} ICMP packets)",
                console::style(ip).red(),
                count,
            );
        }
    }

    if !scan.dns.queries.is_empty() {
        println!(
            "        DNS: {} queries, {} suspicious, {} chatty sources",
            console::style(scan.dns.queries.len()).green(),
            scan.dns.suspicious.len(),
            scan.dns.high_frequency.len(),
        );
        for rec in scan.dns.suspicious.iter().take(5) {
            println!(
                "          {} {} ({})",
                console::style(&rec.src_ip).yellow(),
                rec.query_name,
                rec.reason,
            );
        }
        if scan.dns.suspicious.len() > 5 {
            println!("          ... and {} more", scan.dns.suspicious.len() - 5);
        }
    }

    if !scan.http_requests.is_empty() || !scan.http_responses.is_empty() {
        println!(
            "        HTTP: {} requests, {} responses",
            console::style(scan.http_requests.len()).green(),
            scan.http_responses.len(),
        );
        for req in scan.http_requests.iter().take(5) {
            println!(
                "          {} {} {}",
                console::style(&req.method).cyan(),
                req.url,
                req.version,
            );
        }
        if scan.http_requests.len() > 5 {
            println!("          ... and {} more", scan.http_requests.len() - 5);
        }
    }

    println!(
        "        {} connections tracked, {} incomplete",
        console::style(scan.connections.len()).green(),
        scan.incomplete_connections.len(),
    );

    // 4. Write report
    println!(
        "  {}",
        console::style("[4/4] writing report").cyan().bold(),
    );

    let report = AnalysisReport::build(&capture, parsed, scan);

    let spikes = report.traffic_spikes.iter().filter(|b| b.is_spike).count();
    if spikes > 0 {
        println!(
            "        {} traffic spike buckets",
            console::style(spikes).yellow(),
        );
    }
    if !report.unusual_protocols.is_empty() {
        println!(
            "        unusual protocols: {:?}",
            report.unusual_protocols.keys().collect::<Vec<_>>(),
        );
    }

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("cannot create output dir {}", args.out.display()))?;
    let report_path = args.out.join("report.json");
    let report_json =
        serde_json::to_string_pretty(&report).context("failed to serialize report")?;
    std::fs::write(&report_path, &report_json)
        .with_context(|| format!("failed to write {}", report_path.display()))?;

    println!();
    println!(
        "  {} {}",
        console::style("report ->").green().bold(),
        report_path.display(),
    );
    println!(
        "  {} {} bytes, {} records, {} connections",
        console::style("summary:").white().bold(),
        report_json.len(),
        report.records.len(),
        report.scan.connections.len(),
    );
    println!(
        "  {} {:.1}ms",
        console::style("completed in").white().bold(),
        started.elapsed().as_secs_f64() * 1000.0,
    );

    Ok(())
}
