use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hitrate_core::counterparty::CounterpartyClassifier;
use hitrate_core::domain::record::{RecordQuery, RecordStatus};
use hitrate_core::report::export::DISCOVERY_LIMIT;
use hitrate_core::report::{ExportError, ExportOptions, ExportedDocument, Exporter};

#[derive(Debug, Parser)]
#[command(name = "hitrate_worker", about = "Render prediction history reports")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// One table of every record matching the filters.
    Filtered {
        #[command(flatten)]
        filters: FilterArgs,

        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// One section per instrument with its most recent rows.
    ByInstrument {
        #[command(flatten)]
        filters: FilterArgs,

        /// Rows per instrument. Defaults to 10.
        #[arg(long)]
        rows: Option<usize>,

        /// Cap on in-flight per-instrument fetches. Unbounded when omitted.
        #[arg(long)]
        max_concurrency: Option<usize>,

        #[arg(long)]
        fetch_timeout_secs: Option<u64>,

        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, clap::Args)]
struct FilterArgs {
    #[arg(long)]
    instrument: Option<String>,

    #[arg(long)]
    sector: Option<String>,

    /// YYYY-MM-DD, inclusive.
    #[arg(long)]
    from_date: Option<NaiveDate>,

    /// YYYY-MM-DD, inclusive.
    #[arg(long)]
    to_date: Option<NaiveDate>,

    /// pending, success or error. All statuses when omitted.
    #[arg(long)]
    status: Option<RecordStatus>,
}

impl FilterArgs {
    fn into_query(self) -> anyhow::Result<RecordQuery> {
        if let (Some(from), Some(to)) = (self.from_date, self.to_date) {
            anyhow::ensure!(from <= to, "--from-date {from} is after --to-date {to}");
        }
        Ok(RecordQuery {
            instrument: self
                .instrument
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty()),
            sector: self.sector.filter(|s| !s.trim().is_empty()),
            from_date: self.from_date,
            to_date: self.to_date,
            status: self.status,
            ..Default::default()
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = hitrate_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let cli = Cli::parse();

    let result = run(cli, &settings).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %err, "export failed");
    }
    result
}

async fn run(cli: Cli, settings: &hitrate_core::config::Settings) -> anyhow::Result<()> {
    let source = hitrate_core::source::connect(settings).await?;
    let classifier = CounterpartyClassifier::load(settings.counterparty_table_path.as_deref())?;
    let mut options = ExportOptions::from_settings(settings);
    let now = chrono::Utc::now();

    match cli.command {
        Command::Filtered { filters, output_dir } => {
            if let Some(dir) = output_dir {
                options.output_dir = dir;
            }
            let filter = filters.into_query()?;
            let exporter = Exporter::new(source.as_ref(), &classifier, options);
            let doc = exporter.export_filtered(&filter, now).await?;
            save(&doc, &exporter.options().output_dir)
        }
        Command::ByInstrument {
            filters,
            rows,
            max_concurrency,
            fetch_timeout_secs,
            output_dir,
        } => {
            let rows = rows.unwrap_or(options.row_cap);
            anyhow::ensure!(rows >= 1, "--rows must be >= 1");
            if let Some(dir) = output_dir {
                options.output_dir = dir;
            }
            if max_concurrency.is_some() {
                options.max_concurrent_fetches = max_concurrency;
            }
            if let Some(secs) = fetch_timeout_secs {
                options.fetch_timeout = Some(Duration::from_secs(secs));
            }

            let filter = filters.into_query()?;
            let records = source
                .fetch(&filter.with_limit(DISCOVERY_LIMIT))
                .await
                .context("failed to load the filtered record set")?;

            let exporter = Exporter::new(source.as_ref(), &classifier, options);
            match exporter
                .export_grouped_by_instrument(&records, &filter, rows, now)
                .await
            {
                Ok(doc) => save(&doc, &exporter.options().output_dir),
                Err(err) => match err.downcast_ref::<ExportError>() {
                    Some(ExportError::NothingToExport) => {
                        tracing::info!(filters = %filter.describe(), "nothing to export");
                        println!("No data to export.");
                        Ok(())
                    }
                    None => Err(err),
                },
            }
        }
    }
}

fn save(doc: &ExportedDocument, dir: &std::path::Path) -> anyhow::Result<()> {
    let path = doc.save(dir)?;
    let fallbacks = doc.groups.iter().filter(|g| g.used_fallback).count();
    tracing::info!(
        path = %path.display(),
        pages = doc.pages,
        rows = doc.rows,
        groups = doc.groups.len(),
        fallbacks,
        "report written"
    );
    println!("{}", path.display());
    Ok(())
}

fn init_sentry(settings: &hitrate_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
