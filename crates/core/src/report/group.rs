//! Per-instrument grouping for the grouped export, with best-effort fallback on fetch failure.

use crate::aggregate::rank_counterparties;
use crate::counterparty::CounterpartyClassifier;
use crate::domain::record::{AnalysisRecord, RecordQuery};
use crate::domain::summary::CounterpartyCount;
use crate::metrics::{gain_percent, is_hit};
use crate::source::RecordSource;
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::time::Duration;

/// One instrument's rows, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentGroup {
    pub instrument: String,
    pub records: Vec<AnalysisRecord>,
    pub used_fallback: bool,
}

/// Distinct instruments in ascending name order.
pub fn discover_instruments(records: &[AnalysisRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.instrument.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FanOut {
    /// `None` issues every fetch at once.
    pub max_concurrent: Option<usize>,
    pub timeout: Option<Duration>,
}

/// Fetches the newest `row_cap` rows of every instrument concurrently and joins them as one batch.
///
/// A failed (or timed out) fetch degrades to that instrument's rows in `fallback`. Groups that end
/// up empty are dropped. The result keeps the order of `instruments`.
pub async fn fetch_groups(
    source: &dyn RecordSource,
    filter: &RecordQuery,
    instruments: &[String],
    row_cap: usize,
    fallback: &[AnalysisRecord],
    fan_out: FanOut,
) -> Vec<InstrumentGroup> {
    let tasks = instruments
        .iter()
        .map(|instrument| fetch_group(source, filter, instrument, row_cap, fallback, fan_out.timeout));

    let groups: Vec<InstrumentGroup> = match fan_out.max_concurrent {
        None => futures::future::join_all(tasks).await,
        Some(limit) => stream::iter(tasks).buffered(limit.max(1)).collect().await,
    };

    groups
        .into_iter()
        .filter(|g| {
            if g.records.is_empty() {
                tracing::debug!(instrument = %g.instrument, "skipping empty group");
            }
            !g.records.is_empty()
        })
        .collect()
}

async fn fetch_group(
    source: &dyn RecordSource,
    filter: &RecordQuery,
    instrument: &str,
    row_cap: usize,
    fallback: &[AnalysisRecord],
    timeout: Option<Duration>,
) -> InstrumentGroup {
    let query = filter.for_instrument(instrument, row_cap);
    let fetched = match timeout {
        Some(limit) => match tokio::time::timeout(limit, source.fetch(&query)).await {
            Ok(res) => res,
            Err(_) => Err(anyhow::anyhow!("fetch timed out after {limit:?}")),
        },
        None => source.fetch(&query).await,
    };

    match fetched {
        Ok(mut records) => {
            // Source returns newest first; the report reads forward in time.
            records.reverse();
            InstrumentGroup {
                instrument: instrument.to_string(),
                records,
                used_fallback: false,
            }
        }
        Err(err) => {
            let records = fallback_rows(fallback, instrument, row_cap);
            tracing::warn!(
                instrument,
                error = %err,
                fallback_rows = records.len(),
                "instrument history fetch failed; using rows already loaded"
            );
            InstrumentGroup {
                instrument: instrument.to_string(),
                records,
                used_fallback: true,
            }
        }
    }
}

/// The newest `row_cap` rows of `instrument` in `records`, oldest first.
fn fallback_rows(records: &[AnalysisRecord], instrument: &str, row_cap: usize) -> Vec<AnalysisRecord> {
    let mut rows: Vec<AnalysisRecord> = records
        .iter()
        .filter(|r| r.instrument.trim().eq_ignore_ascii_case(instrument))
        .cloned()
        .collect();
    rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
    let excess = rows.len().saturating_sub(row_cap);
    rows.split_off(excess)
}

/// Aggregate line printed above a table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupStats {
    pub hit_r1: usize,
    pub hit_max: usize,
    /// Entry price above the counterparty's average.
    pub counterparty_plus: usize,
    /// Entry price at or below the counterparty's average.
    pub counterparty_flat_or_minus: usize,
    /// Every counterparty, most frequent first.
    pub counterparties: Vec<CounterpartyCount>,
}

impl GroupStats {
    pub fn from_records(records: &[AnalysisRecord]) -> Self {
        let mut stats = GroupStats::default();
        for r in records {
            if let Some(g) = gain_percent(r.counterparty_avg_price, r.entry_price) {
                if g > 0.0 {
                    stats.counterparty_plus += 1;
                } else {
                    stats.counterparty_flat_or_minus += 1;
                }
            }
            let realized = r.realized();
            stats.hit_r1 += usize::from(is_hit(r.target_r1, &realized));
            stats.hit_max += usize::from(is_hit(r.target_max, &realized));
        }
        stats.counterparties = rank_counterparties(records);
        stats
    }

    pub fn stats_line(&self) -> String {
        format!(
            "Stats: Hit R1: {} | Hit Max: {} | Cpty Avg Plus: {} | Cpty Avg Flat/Minus: {}",
            self.hit_r1, self.hit_max, self.counterparty_plus, self.counterparty_flat_or_minus
        )
    }

    pub fn counterparty_line(&self, classifier: &CounterpartyClassifier) -> String {
        let parts: Vec<String> = self
            .counterparties
            .iter()
            .map(|c| {
                let kind = classifier.classify(&c.name).kind;
                format!("{} ({}): {}", c.name, kind.label(), c.count)
            })
            .collect();
        format!("Counterparties: {}", parts.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::fixtures::record;
    use crate::source::memory::MemoryRecordSource;

    fn dated(id: i64, instrument: &str, day: u32) -> AnalysisRecord {
        record(id, instrument, &format!("2026-01-{day:02}"))
    }

    struct FailingFor {
        inner: MemoryRecordSource,
        failing: &'static str,
    }

    #[async_trait::async_trait]
    impl RecordSource for FailingFor {
        fn source_name(&self) -> &'static str {
            "failing"
        }

        async fn fetch(&self, query: &RecordQuery) -> anyhow::Result<Vec<AnalysisRecord>> {
            if query.instrument.as_deref() == Some(self.failing) {
                anyhow::bail!("connection reset");
            }
            self.inner.fetch(query).await
        }
    }

    struct Stalled;

    #[async_trait::async_trait]
    impl RecordSource for Stalled {
        fn source_name(&self) -> &'static str {
            "stalled"
        }

        async fn fetch(&self, _query: &RecordQuery) -> anyhow::Result<Vec<AnalysisRecord>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[test]
    fn discovers_sorted_distinct_instruments() {
        let records = vec![dated(1, "WXYZ", 5), dated(2, "abcd", 5), dated(3, "ABCD", 6)];
        assert_eq!(discover_instruments(&records), vec!["ABCD", "WXYZ"]);
    }

    #[tokio::test]
    async fn groups_are_newest_rows_in_ascending_order() {
        let records: Vec<AnalysisRecord> = (1..=12).map(|d| dated(d as i64, "ABCD", d)).collect();
        let source = MemoryRecordSource::new(records.clone());
        let groups = fetch_groups(
            &source,
            &RecordQuery::default(),
            &["ABCD".to_string()],
            10,
            &records,
            FanOut::default(),
        )
        .await;

        assert_eq!(groups.len(), 1);
        let ids: Vec<i64> = groups[0].records.iter().map(|r| r.id).collect();
        assert_eq!(ids, (3..=12).collect::<Vec<i64>>());
        assert!(!groups[0].used_fallback);
    }

    #[tokio::test]
    async fn one_failed_fetch_falls_back_without_affecting_others() {
        let names = ["AAAA", "BBBB", "CCCC", "DDDD", "EEEE"];
        let mut records = Vec::new();
        for (i, name) in names.iter().enumerate() {
            for d in 1..=3 {
                records.push(dated((i * 10 + d) as i64, name, d as u32));
            }
        }
        let source = FailingFor {
            inner: MemoryRecordSource::new(records.clone()),
            failing: "CCCC",
        };
        let instruments: Vec<String> = names.iter().map(|s| s.to_string()).collect();

        for fan_out in [
            FanOut::default(),
            FanOut {
                max_concurrent: Some(2),
                timeout: None,
            },
        ] {
            let groups =
                fetch_groups(&source, &RecordQuery::default(), &instruments, 10, &records, fan_out)
                    .await;
            assert_eq!(groups.len(), 5);
            let order: Vec<&str> = groups.iter().map(|g| g.instrument.as_str()).collect();
            assert_eq!(order, names.to_vec());
            for g in &groups {
                assert_eq!(g.records.len(), 3);
                assert_eq!(g.used_fallback, g.instrument == "CCCC");
                assert!(g.records.windows(2).all(|w| w[0].date <= w[1].date));
            }
        }
    }

    #[tokio::test]
    async fn failed_fetch_with_no_fallback_rows_is_skipped() {
        let records = vec![dated(1, "AAAA", 1)];
        let source = FailingFor {
            inner: MemoryRecordSource::new(records.clone()),
            failing: "ZZZZ",
        };
        let groups = fetch_groups(
            &source,
            &RecordQuery::default(),
            &["AAAA".to_string(), "ZZZZ".to_string()],
            10,
            &records,
            FanOut::default(),
        )
        .await;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].instrument, "AAAA");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_degrades_to_fallback() {
        let records = vec![dated(1, "AAAA", 1), dated(2, "AAAA", 2)];
        let groups = fetch_groups(
            &Stalled,
            &RecordQuery::default(),
            &["AAAA".to_string()],
            1,
            &records,
            FanOut {
                max_concurrent: None,
                timeout: Some(Duration::from_secs(5)),
            },
        )
        .await;
        assert_eq!(groups.len(), 1);
        assert!(groups[0].used_fallback);
        let ids: Vec<i64> = groups[0].records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn stats_count_hits_and_counterparty_direction() {
        let mut a = dated(1, "ABCD", 5);
        a.entry_price = Some(100.0);
        a.target_r1 = Some(110.0);
        a.target_max = Some(120.0);
        a.realized_high = Some(121.0);
        a.counterparty = Some("YP".to_string());
        a.counterparty_avg_price = Some(95.0);

        let mut b = dated(2, "ABCD", 6);
        b.entry_price = Some(100.0);
        b.target_r1 = Some(110.0);
        b.realized_close = Some(110.0);
        b.counterparty = Some("AK".to_string());
        b.counterparty_avg_price = Some(100.0);

        let mut c = dated(3, "ABCD", 7);
        c.counterparty = Some("AK".to_string());
        c.counterparty_avg_price = Some(90.0);

        let stats = GroupStats::from_records(&[a, b, c]);
        assert_eq!((stats.hit_r1, stats.hit_max), (2, 1));
        assert_eq!(stats.counterparty_plus, 1);
        assert_eq!(stats.counterparty_flat_or_minus, 1);
        assert_eq!(
            stats.stats_line(),
            "Stats: Hit R1: 2 | Hit Max: 1 | Cpty Avg Plus: 1 | Cpty Avg Flat/Minus: 1"
        );
        assert_eq!(
            stats.counterparty_line(&CounterpartyClassifier::builtin()),
            "Counterparties: AK (Smart Money): 2 | YP (Retail): 1"
        );
    }

    #[test]
    fn counterparty_line_lists_every_counterparty_by_count() {
        let records: Vec<AnalysisRecord> = ["YP", "AK", "BK", "CC", "AK", "XL"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut r = dated(i as i64 + 1, "ABCD", i as u32 + 1);
                r.counterparty = Some(name.to_string());
                r
            })
            .collect();

        let stats = GroupStats::from_records(&records);
        assert_eq!(stats.counterparties.len(), 5);
        assert_eq!(
            stats.counterparty_line(&CounterpartyClassifier::builtin()),
            "Counterparties: AK (Smart Money): 2 | YP (Retail): 1 | BK (Smart Money): 1 | \
             CC (Mixed): 1 | XL (Retail): 1"
        );
    }
}
