use std::collections::HashMap;
use std::net::IpAddr;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_STATIC_THRESHOLD_BYTES: u64 = 1_048_576;
pub const DEFAULT_ADAPTIVE_FACTOR: f64 = 2.0;

/// Volume threshold mode: a fixed byte count, or a multiple of the mean
/// traffic across all observed hosts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VolumeThreshold {
    Static { bytes: u64 },
    Adaptive { factor: f64 },
}

impl VolumeThreshold {
    pub fn static_bytes(bytes: u64) -> Self {
        Self::Static { bytes }
    }

    /// Rejected at construction time, never mid-pass.
    pub fn adaptive(factor: f64) -> Result<Self> {
        ensure!(
            factor.is_finite() && factor > 0.0,
            "adaptive factor must be a finite positive number, got {factor}"
        );
        Ok(Self::Adaptive { factor })
    }

    pub fn validate(&self) -> Result<()> {
        if let Self::Adaptive { factor } = self {
            ensure!(
                factor.is_finite() && *factor > 0.0,
                "adaptive factor must be a finite positive number, got {factor}"
            );
        }
        Ok(())
    }
}

impl Default for VolumeThreshold {
    fn default() -> Self {
        Self::Static {
            bytes: DEFAULT_STATIC_THRESHOLD_BYTES,
        }
    }
}

/// Flag hosts whose byte total strictly exceeds the threshold.
///
/// Adaptive mode compares against mean * factor over all entries; an empty
/// counter yields an empty result. Output is sorted by address so callers
/// get a stable listing; rank-by-volume is the caller's job.
pub fn detect_suspicious(
    ip_traffic: &HashMap<IpAddr, u64>,
    mode: &VolumeThreshold,
) -> Vec<IpAddr> {
    let mut suspicious: Vec<IpAddr> = match mode {
        VolumeThreshold::Static { bytes } => ip_traffic
            .iter()
            .filter(|(_, total)| **total > *bytes)
            .map(|(ip, _)| *ip)
            .collect(),
        VolumeThreshold::Adaptive { factor } => {
            if ip_traffic.is_empty() {
                return Vec::new();
            }
            let mean =
                ip_traffic.values().sum::<u64>() as f64 / ip_traffic.len() as f64;
            let cutoff = mean * factor;
            ip_traffic
                .iter()
                .filter(|(_, total)| **total as f64 > cutoff)
                .map(|(ip, _)| *ip)
                .collect()
        }
    };

    suspicious.sort();
    suspicious
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traffic(entries: &[(&str, u64)]) -> HashMap<IpAddr, u64> {
        entries
            .iter()
            .map(|(ip, bytes)| (ip.parse().unwrap(), *bytes))
            .collect()
    }

    #[test]
    fn test_static_threshold_is_strictly_greater() {
        let counter = traffic(&[("10.0.0.1", 1000), ("10.0.0.2", 1001), ("10.0.0.3", 999)]);
        let flagged = detect_suspicious(&counter, &VolumeThreshold::static_bytes(1000));
        assert_eq!(flagged, vec!["10.0.0.2".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn test_adaptive_threshold_exact_set() {
        // mean = (100 + 200 + 900) / 3 = 400; factor 2 -> cutoff 800
        let counter = traffic(&[("10.0.0.1", 100), ("10.0.0.2", 200), ("10.0.0.3", 900)]);
        let flagged = detect_suspicious(&counter, &VolumeThreshold::adaptive(2.0).unwrap());
        assert_eq!(flagged, vec!["10.0.0.3".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn test_adaptive_empty_counter() {
        let flagged = detect_suspicious(&HashMap::new(), &VolumeThreshold::adaptive(2.0).unwrap());
        assert!(flagged.is_empty());
    }

    #[test]
    fn test_raising_parameter_never_grows_the_set() {
        let counter = traffic(&[
            ("10.0.0.1", 100),
            ("10.0.0.2", 500),
            ("10.0.0.3", 2000),
            ("10.0.0.4", 8000),
        ]);

        let mut prev = usize::MAX;
        for threshold in [0u64, 100, 500, 2000, 8000, 10_000] {
            let n = detect_suspicious(&counter, &VolumeThreshold::static_bytes(threshold)).len();
            assert!(n <= prev, "threshold {threshold} grew the flagged set");
            prev = n;
        }

        let mut prev = usize::MAX;
        for factor in [0.1f64, 0.5, 1.0, 2.0, 4.0] {
            let n = detect_suspicious(&counter, &VolumeThreshold::adaptive(factor).unwrap()).len();
            assert!(n <= prev, "factor {factor} grew the flagged set");
            prev = n;
        }
    }

    #[test]
    fn test_adaptive_factor_rejected_at_construction() {
        assert!(VolumeThreshold::adaptive(0.0).is_err());
        assert!(VolumeThreshold::adaptive(-1.5).is_err());
        assert!(VolumeThreshold::adaptive(f64::NAN).is_err());
        assert!(VolumeThreshold::adaptive(f64::INFINITY).is_err());
        assert!(VolumeThreshold::adaptive(2.5).is_ok());
    }
}
