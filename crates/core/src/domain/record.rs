use anyhow::{bail, ensure};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a tracked prediction, as written by the ingestion flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    #[serde(alias = "complete")]
    Success,
    Error,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Success => "success",
            RecordStatus::Error => "error",
        }
    }

    /// Every spelling the store may hold for this status.
    pub fn store_values(&self) -> &'static [&'static str] {
        match self {
            RecordStatus::Pending => &["pending"],
            RecordStatus::Success => &["success", "complete"],
            RecordStatus::Error => &["error"],
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(RecordStatus::Pending),
            "success" | "complete" => Ok(RecordStatus::Success),
            "error" => Ok(RecordStatus::Error),
            other => bail!("unknown record status: {other}"),
        }
    }
}

/// One tracked prediction for one instrument on one date. Read-only to this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: i64,
    pub date: NaiveDate,
    pub instrument: String,
    pub sector: Option<String>,
    pub counterparty: Option<String>,
    pub counterparty_volume: Option<f64>,
    pub counterparty_avg_price: Option<f64>,
    pub entry_price: Option<f64>,
    pub target_r1: Option<f64>,
    pub target_max: Option<f64>,
    pub realized_high: Option<f64>,
    pub realized_close: Option<f64>,
    pub status: RecordStatus,
    pub error_message: Option<String>,
}

impl AnalysisRecord {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            !self.instrument.trim().is_empty(),
            "instrument must be non-empty (id={})",
            self.id
        );

        let prices = [
            ("counterparty_volume", self.counterparty_volume),
            ("counterparty_avg_price", self.counterparty_avg_price),
            ("entry_price", self.entry_price),
            ("target_r1", self.target_r1),
            ("target_max", self.target_max),
            ("realized_high", self.realized_high),
            ("realized_close", self.realized_close),
        ];
        for (field, value) in prices {
            if let Some(v) = value {
                ensure!(
                    v.is_finite() && v >= 0.0,
                    "{field} must be a non-negative number (id={}, got {v})",
                    self.id
                );
            }
        }

        Ok(())
    }

    /// Realized values checked against targets: intraday high, then close.
    pub fn realized(&self) -> [Option<f64>; 2] {
        [self.realized_high, self.realized_close]
    }

    /// Trimmed counterparty name, `None` when absent or blank.
    pub fn counterparty_name(&self) -> Option<&str> {
        self.counterparty
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Date,
    Instrument,
    Id,
}

impl SortField {
    /// Column name used by the record store.
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Date => "from_date",
            SortField::Instrument => "emiten",
            SortField::Id => "id",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Filter handed to a record source. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    pub instrument: Option<String>,
    pub sector: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub status: Option<RecordStatus>,
    pub limit: Option<usize>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl RecordQuery {
    /// Same filters, narrowed to one instrument's newest `limit` rows.
    pub fn for_instrument(&self, instrument: &str, limit: usize) -> Self {
        Self {
            instrument: Some(instrument.trim().to_uppercase()),
            limit: Some(limit),
            sort_by: SortField::Date,
            sort_order: SortOrder::Desc,
            ..self.clone()
        }
    }

    pub fn with_limit(&self, limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..self.clone()
        }
    }

    pub fn matches(&self, record: &AnalysisRecord) -> bool {
        if let Some(instrument) = &self.instrument {
            if !record.instrument.trim().eq_ignore_ascii_case(instrument.trim()) {
                return false;
            }
        }
        if let Some(sector) = &self.sector {
            if record.sector.as_deref() != Some(sector.as_str()) {
                return false;
            }
        }
        if let Some(from) = self.from_date {
            if record.date < from {
                return false;
            }
        }
        if let Some(to) = self.to_date {
            if record.date > to {
                return false;
            }
        }
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        true
    }

    /// Ordering applied by sources that sort in process. Ties fall back to `id`.
    pub fn compare(&self, a: &AnalysisRecord, b: &AnalysisRecord) -> Ordering {
        let ord = match self.sort_by {
            SortField::Date => a.date.cmp(&b.date),
            SortField::Instrument => a.instrument.cmp(&b.instrument),
            SortField::Id => Ordering::Equal,
        }
        .then_with(|| a.id.cmp(&b.id));

        match self.sort_order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    }

    /// One-line human description used in report headers.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(instrument) = &self.instrument {
            parts.push(format!("Instrument: {instrument}"));
        }
        if let Some(sector) = &self.sector {
            parts.push(format!("Sector: {sector}"));
        }
        if let Some(from) = self.from_date {
            parts.push(format!("From: {from}"));
        }
        if let Some(to) = self.to_date {
            parts.push(format!("To: {to}"));
        }
        parts.push(format!("Status: {}", self.status_label()));
        format!("Filters: {}", parts.join(" | "))
    }

    pub fn status_label(&self) -> &'static str {
        self.status.map(|s| s.as_str()).unwrap_or("all")
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::record;
    use super::*;

    #[test]
    fn status_accepts_complete_alias() {
        assert_eq!("complete".parse::<RecordStatus>().unwrap(), RecordStatus::Success);
        assert_eq!("SUCCESS".parse::<RecordStatus>().unwrap(), RecordStatus::Success);
        assert!("done".parse::<RecordStatus>().is_err());

        let status: RecordStatus = serde_json::from_str("\"complete\"").unwrap();
        assert_eq!(status, RecordStatus::Success);

        for status in [RecordStatus::Pending, RecordStatus::Success, RecordStatus::Error] {
            for raw in status.store_values() {
                assert_eq!(raw.parse::<RecordStatus>().unwrap(), status);
            }
        }
    }

    #[test]
    fn validate_rejects_negative_prices() {
        let mut r = record(1, "ABCD", "2026-01-05");
        r.entry_price = Some(100.0);
        assert!(r.validate().is_ok());

        r.realized_close = Some(-1.0);
        assert!(r.validate().is_err());
    }

    #[test]
    fn query_matches_instrument_case_insensitively_and_date_range_inclusively() {
        let q = RecordQuery {
            instrument: Some("abcd".to_string()),
            from_date: NaiveDate::from_ymd_opt(2026, 1, 5),
            to_date: NaiveDate::from_ymd_opt(2026, 1, 6),
            ..Default::default()
        };
        assert!(q.matches(&record(1, "ABCD", "2026-01-05")));
        assert!(q.matches(&record(2, "ABCD", "2026-01-06")));
        assert!(!q.matches(&record(3, "ABCD", "2026-01-07")));
        assert!(!q.matches(&record(4, "WXYZ", "2026-01-05")));
    }

    #[test]
    fn for_instrument_keeps_filters_and_forces_newest_first() {
        let base = RecordQuery {
            sector: Some("Energy".to_string()),
            status: Some(RecordStatus::Success),
            sort_by: SortField::Instrument,
            sort_order: SortOrder::Asc,
            limit: Some(5000),
            ..Default::default()
        };
        let q = base.for_instrument("abcd", 10);
        assert_eq!(q.instrument.as_deref(), Some("ABCD"));
        assert_eq!(q.sector.as_deref(), Some("Energy"));
        assert_eq!(q.status, Some(RecordStatus::Success));
        assert_eq!(q.limit, Some(10));
        assert_eq!(q.sort_by, SortField::Date);
        assert_eq!(q.sort_order, SortOrder::Desc);
    }

    #[test]
    fn describe_lists_only_set_filters() {
        let q = RecordQuery {
            instrument: Some("ABCD".to_string()),
            ..Default::default()
        };
        assert_eq!(q.describe(), "Filters: Instrument: ABCD | Status: all");
    }
}
