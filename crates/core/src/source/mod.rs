use crate::config::Settings;
use crate::domain::record::{AnalysisRecord, RecordQuery};
use anyhow::Context;
use std::sync::Arc;

pub mod http;
pub mod memory;
pub mod postgres;

/// Read-only query capability over the external record store.
#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch(&self, query: &RecordQuery) -> anyhow::Result<Vec<AnalysisRecord>>;
}

/// HTTP source when `RECORD_SOURCE_URL` is set, otherwise Postgres via `DATABASE_URL`.
pub async fn connect(settings: &Settings) -> anyhow::Result<Arc<dyn RecordSource>> {
    if settings.record_source_url.is_some() {
        let source = http::HttpRecordSource::from_settings(settings)?;
        return Ok(Arc::new(source));
    }

    let db_url = settings
        .require_database_url()
        .context("no record source configured (set RECORD_SOURCE_URL or DATABASE_URL)")?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;
    Ok(Arc::new(postgres::PgRecordSource::new(pool)))
}
