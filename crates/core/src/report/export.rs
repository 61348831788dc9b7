//! Top-level export driver: fetch, group, render and name the document.

use crate::config::Settings;
use crate::counterparty::CounterpartyClassifier;
use crate::domain::record::{AnalysisRecord, RecordQuery};
use crate::report::group::{discover_instruments, fetch_groups, FanOut, GroupStats};
use crate::report::surface::{Align, Rgb, Surface, TextStyle};
use crate::report::svg::SvgDocument;
use crate::report::table::{draw_table, TableLayout};
use crate::source::RecordSource;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Cap on the broad fetch used to discover instruments; stands in for "all".
pub const DISCOVERY_LIMIT: usize = 5000;
pub const DEFAULT_ROW_CAP: usize = 10;

const MARGIN_X: f64 = 14.0;
const EMPTY_TABLE_MESSAGE: &str = "No data";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Rows per instrument when the caller does not pick one.
    pub row_cap: usize,
    pub discovery_limit: usize,
    /// `None` fetches every instrument at once. Acceptable while instrument counts stay small.
    pub max_concurrent_fetches: Option<usize>,
    /// Without a timeout a stalled fetch stalls the whole batch.
    pub fetch_timeout: Option<Duration>,
    pub layout: TableLayout,
    pub output_dir: PathBuf,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            row_cap: DEFAULT_ROW_CAP,
            discovery_limit: DISCOVERY_LIMIT,
            max_concurrent_fetches: None,
            fetch_timeout: None,
            layout: TableLayout::default(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl ExportOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_concurrent_fetches: settings.export_max_concurrent_fetches,
            fetch_timeout: settings.export_fetch_timeout,
            output_dir: settings.export_output_dir.clone(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// The record set handed to the export was empty.
    NothingToExport,
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::NothingToExport => f.write_str("nothing to export: no records in the current selection"),
        }
    }
}

impl std::error::Error for ExportError {}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportedGroup {
    pub instrument: String,
    pub rows: usize,
    pub used_fallback: bool,
    pub first_page: usize,
    /// Pages the group's table spans.
    pub pages: usize,
    pub stats: GroupStats,
}

#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub filename: String,
    pub pages: usize,
    pub rows: usize,
    /// Empty for the flat export.
    pub groups: Vec<ExportedGroup>,
    pub html: String,
}

impl ExportedDocument {
    pub fn save(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output dir {}", dir.display()))?;
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.html)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

pub fn filtered_filename(generated_at: DateTime<Utc>) -> String {
    format!("prediction-history-filtered-{}.html", generated_at.format("%Y-%m-%d"))
}

pub fn grouped_filename(generated_at: DateTime<Utc>) -> String {
    format!(
        "prediction-history-by-instrument-{}.html",
        generated_at.format("%Y-%m-%d")
    )
}

pub struct Exporter<'a> {
    source: &'a dyn RecordSource,
    classifier: &'a CounterpartyClassifier,
    options: ExportOptions,
}

impl<'a> Exporter<'a> {
    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    pub fn new(
        source: &'a dyn RecordSource,
        classifier: &'a CounterpartyClassifier,
        options: ExportOptions,
    ) -> Self {
        Self {
            source,
            classifier,
            options,
        }
    }

    /// Single fetch, single flat table.
    pub async fn export_filtered(
        &self,
        filter: &RecordQuery,
        generated_at: DateTime<Utc>,
    ) -> anyhow::Result<ExportedDocument> {
        let records = self
            .source
            .fetch(filter)
            .await
            .with_context(|| format!("failed to fetch records from {}", self.source.source_name()))?;

        let mut doc = SvgDocument::a4_portrait();
        let stats = GroupStats::from_records(&records);
        self.draw_heading(
            &mut doc,
            "PREDICTION HISTORY (FILTERED)",
            &filter.describe(),
            &stats,
        );
        let table = draw_table(&mut doc, &self.options.layout, &records, EMPTY_TABLE_MESSAGE);

        let filename = filtered_filename(generated_at);
        let pages = table.pages;
        tracing::info!(rows = records.len(), pages, %filename, "filtered export rendered");

        Ok(ExportedDocument {
            filename,
            pages,
            rows: records.len(),
            groups: Vec::new(),
            html: doc.finish("Prediction history (filtered)"),
        })
    }

    /// One section per instrument, each holding its newest `row_cap` rows oldest first.
    ///
    /// `records` is the caller's current record set: it must be non-empty, and it backs any
    /// instrument whose own fetch fails.
    pub async fn export_grouped_by_instrument(
        &self,
        records: &[AnalysisRecord],
        filter: &RecordQuery,
        row_cap: usize,
        generated_at: DateTime<Utc>,
    ) -> anyhow::Result<ExportedDocument> {
        if records.is_empty() {
            return Err(ExportError::NothingToExport.into());
        }
        anyhow::ensure!(row_cap >= 1, "row cap must be >= 1 (got {row_cap})");

        let discovery = filter.with_limit(self.options.discovery_limit);
        let all = self
            .source
            .fetch(&discovery)
            .await
            .with_context(|| format!("failed to discover instruments from {}", self.source.source_name()))?;
        let instruments = discover_instruments(&all);

        let groups = fetch_groups(
            self.source,
            filter,
            &instruments,
            row_cap,
            records,
            FanOut {
                max_concurrent: self.options.max_concurrent_fetches,
                timeout: self.options.fetch_timeout,
            },
        )
        .await;

        let mut doc = SvgDocument::a4_portrait();
        let total = groups.len();
        let mut exported = Vec::with_capacity(total);
        let mut rows = 0;

        for (idx, group) in groups.into_iter().enumerate() {
            if idx > 0 {
                doc.add_page();
            }
            let first_page = doc.page_count();
            let stats = GroupStats::from_records(&group.records);

            self.draw_heading(
                &mut doc,
                &format!(
                    "PREDICTION HISTORY {} (LAST {})",
                    group.instrument,
                    group.records.len()
                ),
                &format!("Status: {}", filter.status_label()),
                &stats,
            );
            let table = draw_table(&mut doc, &self.options.layout, &group.records, EMPTY_TABLE_MESSAGE);
            draw_footer(&mut doc, &format!("Page {} of {}", idx + 1, total));

            rows += group.records.len();
            exported.push(ExportedGroup {
                instrument: group.instrument,
                rows: group.records.len(),
                used_fallback: group.used_fallback,
                first_page,
                pages: table.pages,
                stats,
            });
        }

        let filename = grouped_filename(generated_at);
        let pages = doc.page_count();
        let fallbacks = exported.iter().filter(|g| g.used_fallback).count();
        tracing::info!(
            instruments = instruments.len(),
            groups = total,
            fallbacks,
            rows,
            pages,
            %filename,
            "grouped export rendered"
        );

        Ok(ExportedDocument {
            filename,
            pages,
            rows,
            groups: exported,
            html: doc.finish("Prediction history by instrument"),
        })
    }

    fn draw_heading(&self, surface: &mut dyn Surface, title: &str, subtitle: &str, stats: &GroupStats) {
        surface.text(MARGIN_X, 15.0, title, TextStyle::new(16.0, Rgb::TEXT));
        surface.text(MARGIN_X, 21.0, subtitle, TextStyle::new(9.0, Rgb::SUBTLE));
        let stats_style = TextStyle::new(8.5, Rgb::STATS);
        surface.text(MARGIN_X, 26.0, &stats.stats_line(), stats_style);
        surface.text(
            MARGIN_X,
            30.5,
            &stats.counterparty_line(self.classifier),
            stats_style,
        );
    }
}

fn draw_footer(surface: &mut dyn Surface, label: &str) {
    let (width, height) = surface.page_size();
    surface.text(
        width - MARGIN_X,
        height - 10.0,
        label,
        TextStyle::new(8.0, Rgb::FOOTER).align(Align::Right),
    );
}
