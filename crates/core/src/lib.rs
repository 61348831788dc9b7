pub mod aggregate;
pub mod counterparty;
pub mod domain;
pub mod metrics;
pub mod report;
pub mod source;

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;
    use std::str::FromStr;
    use std::time::Duration;

    const DEFAULT_RECORD_SOURCE_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_RECORD_SOURCE_RETRIES: u32 = 3;
    const DEFAULT_RECORD_SOURCE_PATH: &str = "/api/watchlist-history";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub record_source_url: Option<String>,
        pub record_source_api_key: Option<String>,
        pub record_source_path: String,
        pub record_source_timeout: Duration,
        /// Attempts per request, at least 1.
        pub record_source_retries: u32,
        pub sentry_dsn: Option<String>,
        pub counterparty_table_path: Option<PathBuf>,
        pub export_output_dir: PathBuf,
        pub export_max_concurrent_fetches: Option<usize>,
        pub export_fetch_timeout: Option<Duration>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let export_max_concurrent_fetches = parse_env::<usize>("EXPORT_MAX_CONCURRENT_FETCHES")?;
            let export_fetch_timeout =
                parse_env::<u64>("EXPORT_FETCH_TIMEOUT_SECS")?.map(Duration::from_secs);

            let record_source_timeout = Duration::from_secs(
                parse_env::<u64>("RECORD_SOURCE_TIMEOUT_SECS")?
                    .unwrap_or(DEFAULT_RECORD_SOURCE_TIMEOUT_SECS),
            );
            let record_source_retries = parse_env::<u32>("RECORD_SOURCE_RETRIES")?
                .unwrap_or(DEFAULT_RECORD_SOURCE_RETRIES);
            anyhow::ensure!(
                record_source_retries >= 1,
                "RECORD_SOURCE_RETRIES must be >= 1 (got {record_source_retries})"
            );

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                record_source_url: std::env::var("RECORD_SOURCE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                record_source_api_key: std::env::var("RECORD_SOURCE_API_KEY").ok(),
                record_source_path: std::env::var("RECORD_SOURCE_PATH")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_RECORD_SOURCE_PATH.to_string()),
                record_source_timeout,
                record_source_retries,
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                counterparty_table_path: std::env::var("COUNTERPARTY_TABLE_PATH")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .map(PathBuf::from),
                export_output_dir: std::env::var("EXPORT_OUTPUT_DIR")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(".")),
                export_max_concurrent_fetches,
                export_fetch_timeout,
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_record_source_url(&self) -> anyhow::Result<&str> {
            self.record_source_url
                .as_deref()
                .context("RECORD_SOURCE_URL is required")
        }
    }

    /// Unset or blank is `None`; anything else must parse.
    fn parse_env<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match std::env::var(key) {
            Ok(s) if !s.trim().is_empty() => s
                .trim()
                .parse::<T>()
                .map(Some)
                .with_context(|| format!("invalid {key}: {s}")),
            _ => Ok(None),
        }
    }

}
