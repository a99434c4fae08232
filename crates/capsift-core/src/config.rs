use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::dns::{DEFAULT_DNS_FREQUENCY_THRESHOLD, DEFAULT_DNS_LENGTH_THRESHOLD};
use crate::scan::{
    DEFAULT_ICMP_FLOOD_THRESHOLD, DEFAULT_PORT_SCAN_THRESHOLD, DEFAULT_SYN_FLOOD_THRESHOLD,
};
use crate::volume::VolumeThreshold;

/// Detector thresholds, overridable from a JSON config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub volume: VolumeThreshold,
    pub port_scan_threshold: usize,
    pub syn_flood_threshold: u64,
    pub icmp_flood_threshold: u64,
    pub dns_length_threshold: usize,
    pub dns_frequency_threshold: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            volume: VolumeThreshold::default(),
            port_scan_threshold: DEFAULT_PORT_SCAN_THRESHOLD,
            syn_flood_threshold: DEFAULT_SYN_FLOOD_THRESHOLD,
            icmp_flood_threshold: DEFAULT_ICMP_FLOOD_THRESHOLD,
            dns_length_threshold: DEFAULT_DNS_LENGTH_THRESHOLD,
            dns_frequency_threshold: DEFAULT_DNS_FREQUENCY_THRESHOLD,
        }
    }
}

impl AnalysisConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.volume.validate()?;
        ensure!(
            self.port_scan_threshold >= 1,
            "port scan threshold must be at least 1"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.port_scan_threshold, 10);
        assert_eq!(config.syn_flood_threshold, 20);
        assert_eq!(config.icmp_flood_threshold, 50);
        assert_eq!(config.dns_length_threshold, 50);
        assert_eq!(config.dns_frequency_threshold, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"port_scan_threshold": 5}"#).unwrap();
        assert_eq!(config.port_scan_threshold, 5);
        assert_eq!(config.syn_flood_threshold, 20);
    }

    #[test]
    fn test_volume_mode_from_json() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"volume": {"mode": "adaptive", "factor": 5.0}}"#).unwrap();
        match config.volume {
            VolumeThreshold::Adaptive { factor } => assert_eq!(factor, 5.0),
            other => panic!("unexpected threshold {other:?}"),
        }
    }

    #[test]
    fn test_zero_port_scan_threshold_rejected() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"port_scan_threshold": 0}"#).unwrap();
        assert!(config.validate().is_err());
    }
}
