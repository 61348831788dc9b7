use crate::counterparty::CounterpartyType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Window sizes the dashboard offers.
pub const WINDOW_SIZES: [usize; 5] = [3, 5, 10, 20, 50];
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Number of most recent records per instrument an aggregate is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct WindowSize(usize);

impl WindowSize {
    pub fn new(size: usize) -> Result<Self, WindowSizeError> {
        if WINDOW_SIZES.contains(&size) {
            Ok(Self(size))
        } else {
            Err(WindowSizeError { requested: size })
        }
    }

    /// Boundary-layer normalization: anything absent, unparsable or outside
    /// [`WINDOW_SIZES`] becomes the default.
    pub fn from_param(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.trim().parse::<usize>().ok())
            .and_then(|n| Self::new(n).ok())
            .unwrap_or_default()
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self(DEFAULT_WINDOW_SIZE)
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSizeError {
    pub requested: usize,
}

impl fmt::Display for WindowSizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "window size must be one of {:?} (got {})",
            WINDOW_SIZES, self.requested
        )
    }
}

impl std::error::Error for WindowSizeError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterpartyCount {
    pub name: String,
    pub count: usize,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<CounterpartyType>,
}

/// Display band of the combined hit rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitRateBand {
    High,
    Medium,
    Low,
}

impl HitRateBand {
    pub fn from_rate(rate: f64) -> Self {
        if rate >= 80.0 {
            HitRateBand::High
        } else if rate >= 50.0 {
            HitRateBand::Medium
        } else {
            HitRateBand::Low
        }
    }
}

/// Per-instrument aggregate over its most recent records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub instrument: String,
    pub sector: Option<String>,
    pub trading_days: usize,
    pub hit_r1: usize,
    pub hit_max: usize,
    pub hit_rate_r1: f64,
    pub hit_rate_max: f64,
    pub total_hit_rate: f64,
    pub band: HitRateBand,
    pub top_counterparties: Vec<CounterpartyCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_size_rejects_values_outside_the_set() {
        for n in WINDOW_SIZES {
            assert_eq!(WindowSize::new(n).unwrap().get(), n);
        }
        for n in [0, 1, 4, 6, 15, 51, 100] {
            assert_eq!(WindowSize::new(n), Err(WindowSizeError { requested: n }));
        }
    }

    #[test]
    fn boundary_normalizes_invalid_limits_to_five() {
        for raw in [None, Some(""), Some("abc"), Some("7"), Some("-3"), Some("0"), Some("500")] {
            assert_eq!(WindowSize::from_param(raw).get(), 5, "raw={raw:?}");
        }
        assert_eq!(WindowSize::from_param(Some("20")).get(), 20);
        assert_eq!(WindowSize::from_param(Some(" 3 ")).get(), 3);
    }

    #[test]
    fn band_thresholds() {
        assert_eq!(HitRateBand::from_rate(80.0), HitRateBand::High);
        assert_eq!(HitRateBand::from_rate(79.9), HitRateBand::Medium);
        assert_eq!(HitRateBand::from_rate(50.0), HitRateBand::Medium);
        assert_eq!(HitRateBand::from_rate(0.0), HitRateBand::Low);
    }
}
