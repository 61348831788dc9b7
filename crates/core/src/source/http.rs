use crate::config::Settings;
use crate::domain::record::{AnalysisRecord, RecordQuery, RecordStatus};
use crate::source::RecordSource;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Client for the history endpoint of the record store.
#[derive(Debug, Clone)]
pub struct HttpRecordSource {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
    retries: u32,
}

/// A failed attempt, split by whether repeating it can help.
#[derive(Debug)]
enum Failure {
    /// Transport errors, 5xx and 429.
    Transient(anyhow::Error),
    /// 4xx, `success: false` bodies and rows that fail to decode.
    Permanent(anyhow::Error),
}

fn retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

impl HttpRecordSource {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::build(
            settings.require_record_source_url()?.to_string(),
            settings.record_source_api_key.clone(),
            settings.record_source_path.clone(),
            settings.record_source_timeout,
            settings.record_source_retries,
        )
    }

    fn build(
        base_url: String,
        api_key: Option<String>,
        path: String,
        timeout: Duration,
        retries: u32,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build record source http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            path,
            retries: retries.max(1),
        })
    }

    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn fetch_once(&self, query: &RecordQuery) -> Result<Vec<AnalysisRecord>, Failure> {
        let headers = self.headers().map_err(Failure::Permanent)?;
        let res = self
            .http
            .get(self.url())
            .headers(headers)
            .query(&query_params(query))
            .send()
            .await
            .context("record source request failed")
            .map_err(Failure::Transient)?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read record source response")
            .map_err(Failure::Transient)?;

        if !status.is_success() {
            let err = anyhow::anyhow!("record source HTTP {status}: {text}");
            return Err(if retryable_status(status) {
                Failure::Transient(err)
            } else {
                Failure::Permanent(err)
            });
        }

        parse_response(&text).map_err(Failure::Permanent)
    }
}

#[async_trait::async_trait]
impl RecordSource for HttpRecordSource {
    fn source_name(&self) -> &'static str {
        "http_json"
    }

    async fn fetch(&self, query: &RecordQuery) -> Result<Vec<AnalysisRecord>> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(query).await {
                Ok(records) => return Ok(records),
                Err(Failure::Permanent(err)) => return Err(err),
                Err(Failure::Transient(err)) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(attempt, ?backoff, error = %err, "record source fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

fn query_params(query: &RecordQuery) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(instrument) = &query.instrument {
        params.push(("emiten", instrument.trim().to_uppercase()));
    }
    if let Some(sector) = &query.sector {
        params.push(("sector", sector.clone()));
    }
    if let Some(from) = query.from_date {
        params.push(("fromDate", from.to_string()));
    }
    if let Some(to) = query.to_date {
        params.push(("toDate", to.to_string()));
    }
    if let Some(status) = query.status {
        params.push(("status", status.as_str().to_string()));
    }
    if let Some(limit) = query.limit {
        params.push(("limit", limit.to_string()));
    }
    params.push(("sortBy", query.sort_by.column().to_string()));
    params.push(("sortOrder", query.sort_order.as_str().to_string()));
    params
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    success: bool,
    #[serde(default)]
    data: Vec<StoreRecord>,
    error: Option<String>,
}

/// Row shape of the external store.
#[derive(Debug, Deserialize)]
struct StoreRecord {
    id: i64,
    from_date: String,
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

impl TryFrom<StoreRecord> for AnalysisRecord {
    type Error = anyhow::Error;

    fn try_from(row: StoreRecord) -> Result<Self> {
        // Timestamps arrive either as plain dates or full ISO-8601 strings.
        let date_part = row.from_date.get(..10).unwrap_or(&row.from_date);
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .with_context(|| format!("invalid from_date {:?} (id={})", row.from_date, row.id))?;
        let status: RecordStatus = row.status.parse()?;

        let record = AnalysisRecord {
            id: row.id,
            date,
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
            status,
            error_message: row.error_message,
        };
        record.validate()?;
        Ok(record)
    }
}

fn parse_response(text: &str) -> Result<Vec<AnalysisRecord>> {
    let parsed: HistoryResponse = serde_json::from_str(text)
        .with_context(|| format!("record source response is not valid JSON: {text}"))?;

    if !parsed.success {
        anyhow::bail!(
            "record source reported failure: {}",
            parsed.error.as_deref().unwrap_or("unknown error")
        );
    }

    parsed.data.into_iter().map(AnalysisRecord::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{SortField, SortOrder};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// One-route HTTP server answering every request with `status_line` and `body`.
    /// Returns its base URL and a count of requests served.
    async fn canned_server(status_line: &'static str, body: String) -> (String, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}"), hits)
    }

    fn client(base_url: String, retries: u32) -> HttpRecordSource {
        HttpRecordSource::build(
            base_url,
            Some("secret".to_string()),
            "/api/watchlist-history".to_string(),
            Duration::from_secs(5),
            retries,
        )
        .unwrap()
    }

    #[test]
    fn only_server_side_statuses_are_retryable() {
        assert!(retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!retryable_status(StatusCode::BAD_REQUEST));
        assert!(!retryable_status(StatusCode::NOT_FOUND));
        assert!(!retryable_status(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let (url, hits) = canned_server("400 Bad Request", "{}".to_string()).await;
        let err = client(url, 3).fetch(&RecordQuery::default()).await.unwrap_err();
        assert!(err.to_string().contains("400"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_bodies_are_not_retried() {
        let body = json!({"success": false, "error": "bad filter"}).to_string();
        let (url, hits) = canned_server("200 OK", body).await;
        let err = client(url, 3).fetch(&RecordQuery::default()).await.unwrap_err();
        assert!(err.to_string().contains("bad filter"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_errors_are_retried_up_to_the_limit() {
        let (url, hits) = canned_server("503 Service Unavailable", "{}".to_string()).await;
        let err = client(url, 2).fetch(&RecordQuery::default()).await.unwrap_err();
        assert!(err.to_string().contains("503"));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn parses_store_rows() {
        let body = json!({
            "success": true,
            "data": [
                {
                    "id": 7,
                    "from_date": "2026-01-05T00:00:00+00:00",
                    "emiten": "abcd",
                    "sector": "Energy",
                    "bandar": "AK",
                    "barang_bandar": 12000,
                    "rata_rata_bandar": 95.5,
                    "harga": 100,
                    "target_realistis": 110,
                    "target_max": 120,
                    "max_harga": 112,
                    "real_harga": 108,
                    "status": "success",
                    "error_message": null
                }
            ]
        })
        .to_string();

        let records = parse_response(&body).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.instrument, "ABCD");
        assert_eq!(r.date, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        assert_eq!(r.counterparty.as_deref(), Some("AK"));
        assert_eq!(r.target_r1, Some(110.0));
        assert_eq!(r.realized_high, Some(112.0));
        assert_eq!(r.status, RecordStatus::Success);
    }

    #[test]
    fn unsuccessful_body_is_an_error() {
        let body = json!({"success": false, "error": "boom"}).to_string();
        let err = parse_response(&body).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn negative_prices_are_rejected() {
        let body = json!({
            "success": true,
            "data": [{
                "id": 1, "from_date": "2026-01-05", "emiten": "ABCD",
                "harga": -5, "status": "success"
            }]
        })
        .to_string();
        assert!(parse_response(&body).is_err());
    }

    #[test]
    fn query_params_use_store_names() {
        let q = RecordQuery {
            instrument: Some("abcd".to_string()),
            limit: Some(10),
            sort_by: SortField::Date,
            sort_order: SortOrder::Desc,
            ..Default::default()
        };
        let params = query_params(&q);
        assert!(params.contains(&("emiten", "ABCD".to_string())));
        assert!(params.contains(&("limit", "10".to_string())));
        assert!(params.contains(&("sortBy", "from_date".to_string())));
        assert!(params.contains(&("sortOrder", "desc".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "status"));
    }
}
