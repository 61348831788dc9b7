//! Rolling per-instrument hit-rate summaries.

use crate::counterparty::CounterpartyClassifier;
use crate::domain::record::{AnalysisRecord, RecordQuery, RecordStatus, SortField, SortOrder};
use crate::domain::summary::{CounterpartyCount, HitRateBand, SummaryRecord, WindowSize};
use crate::metrics::{hit_rate, is_hit};
use crate::source::RecordSource;
use anyhow::Context;
use std::collections::BTreeMap;

const TOP_COUNTERPARTIES: usize = 3;

/// Summarizes the newest `window_size` records of every instrument in `records`.
///
/// `window_size` must be one of [`crate::domain::summary::WINDOW_SIZES`]; normalizing user
/// input is the caller's job. Output is ordered by instrument name.
pub fn summarize(records: &[AnalysisRecord], window_size: usize) -> anyhow::Result<Vec<SummaryRecord>> {
    let window = WindowSize::new(window_size)?;

    // Same identity as `discover_instruments`: trimmed, upper-cased ticker.
    let mut by_instrument: BTreeMap<String, Vec<&AnalysisRecord>> = BTreeMap::new();
    for r in records {
        let key = r.instrument.trim().to_uppercase();
        if key.is_empty() {
            continue;
        }
        by_instrument.entry(key).or_default().push(r);
    }

    let mut out = Vec::with_capacity(by_instrument.len());
    for (instrument, mut rows) in by_instrument {
        rows.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
        rows.truncate(window.get());
        out.push(summarize_window(&instrument, &rows));
    }

    Ok(out)
}

/// `rows` must already be the newest-first window of one instrument.
fn summarize_window(instrument: &str, rows: &[&AnalysisRecord]) -> SummaryRecord {
    let trading_days = rows.len();
    let mut hit_r1 = 0;
    let mut hit_max = 0;
    let mut hit_any = 0;

    for r in rows {
        let realized = r.realized();
        let r1 = is_hit(r.target_r1, &realized);
        let max = is_hit(r.target_max, &realized);
        hit_r1 += usize::from(r1);
        hit_max += usize::from(max);
        hit_any += usize::from(r1 || max);
    }

    let sector = rows
        .iter()
        .find_map(|r| r.sector.as_deref().filter(|s| !s.trim().is_empty()))
        .map(str::to_string);

    let mut top_counterparties = rank_counterparties(rows.iter().copied());
    top_counterparties.truncate(TOP_COUNTERPARTIES);

    let total_hit_rate = hit_rate(hit_any, trading_days);
    SummaryRecord {
        instrument: instrument.to_string(),
        sector,
        trading_days,
        hit_r1,
        hit_max,
        hit_rate_r1: hit_rate(hit_r1, trading_days),
        hit_rate_max: hit_rate(hit_max, trading_days),
        total_hit_rate,
        band: HitRateBand::from_rate(total_hit_rate),
        top_counterparties,
    }
}

/// Counts counterparty appearances, descending by count. Equal counts keep first-seen order.
pub fn rank_counterparties<'a>(
    records: impl IntoIterator<Item = &'a AnalysisRecord>,
) -> Vec<CounterpartyCount> {
    let mut counts: Vec<CounterpartyCount> = Vec::new();
    for r in records {
        let Some(name) = r.counterparty_name() else {
            continue;
        };
        match counts.iter_mut().find(|c| c.name == name) {
            Some(c) => c.count += 1,
            None => counts.push(CounterpartyCount {
                name: name.to_string(),
                count: 1,
                kind: None,
            }),
        }
    }
    // Stable sort keeps first-seen order within equal counts.
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

/// Loads completed records from `source` and summarizes them, with counterparty categories filled in.
pub async fn load_summary(
    source: &dyn RecordSource,
    window: WindowSize,
    classifier: &CounterpartyClassifier,
) -> anyhow::Result<Vec<SummaryRecord>> {
    let query = RecordQuery {
        status: Some(RecordStatus::Success),
        sort_by: SortField::Date,
        sort_order: SortOrder::Desc,
        ..Default::default()
    };
    let records = source
        .fetch(&query)
        .await
        .with_context(|| format!("failed to load records from {}", source.source_name()))?;

    let mut summary = summarize(&records, window.get())?;
    for row in &mut summary {
        classifier.annotate(&mut row.top_counterparties);
    }

    tracing::info!(
        window = window.get(),
        records = records.len(),
        instruments = summary.len(),
        "computed hit-rate summary"
    );
    Ok(summary)
}
