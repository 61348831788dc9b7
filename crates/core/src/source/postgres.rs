use crate::domain::record::{AnalysisRecord, RecordQuery, SortOrder};
use crate::source::RecordSource;
use anyhow::Context;
use chrono::NaiveDate;

// The store is owned by the ingestion flow; this crate only reads it.
const TABLE: &str = "watchlist_history";

#[derive(Debug, Clone)]
pub struct PgRecordSource {
    pool: sqlx::PgPool,
}

impl PgRecordSource {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    id: i64,
    from_date: NaiveDate,
    emiten: String,
    sector: Option<String>,
    bandar: Option<String>,
    barang_bandar: Option<f64>,
    rata_rata_bandar: Option<f64>,
    harga: Option<f64>,
    target_realistis: Option<f64>,
    target_max: Option<f64>,
    max_harga: Option<f64>,
    real_harga: Option<f64>,
    status: String,
    error_message: Option<String>,
}

impl TryFrom<StoreRow> for AnalysisRecord {
    type Error = anyhow::Error;

    fn try_from(row: StoreRow) -> anyhow::Result<Self> {
        let record = AnalysisRecord {
            id: row.id,
            date: row.from_date,
            instrument: row.emiten.trim().to_uppercase(),
            sector: row.sector.filter(|s| !s.trim().is_empty()),
            counterparty: row.bandar.filter(|s| !s.trim().is_empty()),
            counterparty_volume: row.barang_bandar,
            counterparty_avg_price: row.rata_rata_bandar,
            entry_price: row.harga,
            target_r1: row.target_realistis,
            target_max: row.target_max,
            realized_high: row.max_harga,
            realized_close: row.real_harga,
            status: row.status.parse()?,
            error_message: row.error_message,
        };
        record.validate()?;
        Ok(record)
    }
}

fn build_select(query: &RecordQuery) -> sqlx::QueryBuilder<'static, sqlx::Postgres> {
    let mut qb = sqlx::QueryBuilder::new(format!(
        "SELECT id::int8 AS id, from_date::date AS from_date, emiten, sector, bandar, \
         barang_bandar::float8 AS barang_bandar, rata_rata_bandar::float8 AS rata_rata_bandar, \
         harga::float8 AS harga, target_realistis::float8 AS target_realistis, \
         target_max::float8 AS target_max, max_harga::float8 AS max_harga, \
         real_harga::float8 AS real_harga, status, error_message \
         FROM {TABLE} WHERE TRUE"
    ));

    if let Some(instrument) = &query.instrument {
        qb.push(" AND UPPER(emiten) = ")
            .push_bind(instrument.trim().to_uppercase());
    }
    if let Some(sector) = &query.sector {
        qb.push(" AND sector = ").push_bind(sector.clone());
    }
    if let Some(from) = query.from_date {
        qb.push(" AND from_date >= ").push_bind(from);
    }
    if let Some(to) = query.to_date {
        qb.push(" AND from_date <= ").push_bind(to);
    }
    if let Some(status) = query.status {
        let values: Vec<String> = status.store_values().iter().map(|v| v.to_string()).collect();
        qb.push(" AND LOWER(status) = ANY(").push_bind(values).push(")");
    }

    let dir = match query.sort_order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    qb.push(format!(
        " ORDER BY {} {dir}, id {dir}",
        query.sort_by.column()
    ));

    if let Some(limit) = query.limit {
        qb.push(" LIMIT ").push_bind(limit as i64);
    }

    qb
}

#[async_trait::async_trait]
impl RecordSource for PgRecordSource {
    fn source_name(&self) -> &'static str {
        "postgres"
    }

    async fn fetch(&self, query: &RecordQuery) -> anyhow::Result<Vec<AnalysisRecord>> {
        let t0 = std::time::Instant::now();
        let rows: Vec<StoreRow> = build_select(query)
            .build_query_as()
            .persistent(false)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("select {TABLE} failed"))?;

        tracing::debug!(
            rows = rows.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            instrument = query.instrument.as_deref().unwrap_or("*"),
            "record store query"
        );

        rows.into_iter().map(AnalysisRecord::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{RecordStatus, SortField};

    #[test]
    fn select_binds_every_filter() {
        let q = RecordQuery {
            instrument: Some("abcd".to_string()),
            sector: Some("Energy".to_string()),
            from_date: NaiveDate::from_ymd_opt(2026, 1, 1),
            to_date: NaiveDate::from_ymd_opt(2026, 1, 31),
            status: Some(RecordStatus::Success),
            limit: Some(10),
            sort_by: SortField::Date,
            sort_order: SortOrder::Desc,
        };
        let sql = build_select(&q).into_sql();
        assert!(sql.contains("UPPER(emiten) = $1"));
        assert!(sql.contains("sector = $2"));
        assert!(sql.contains("from_date >= $3"));
        assert!(sql.contains("from_date <= $4"));
        assert!(sql.contains("LOWER(status) = ANY($5)"));
        assert!(sql.contains("ORDER BY from_date DESC, id DESC"));
        assert!(sql.ends_with("LIMIT $6"));
    }

    #[test]
    fn unfiltered_select_has_no_limit() {
        let sql = build_select(&RecordQuery::default()).into_sql();
        assert!(sql.ends_with("ORDER BY from_date DESC, id DESC"));
    }
}
