use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hitrate_core::counterparty::CounterpartyClassifier;
use hitrate_core::domain::summary::{SummaryRecord, WindowSize};
use hitrate_core::source::RecordSource;

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

    let source = match hitrate_core::source::connect(&settings).await {
        Ok(source) => Some(source),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "record source unavailable; starting API in degraded mode");
            None
        }
    };

    let classifier = match CounterpartyClassifier::load(settings.counterparty_table_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "counterparty table unreadable; using built-in table");
            CounterpartyClassifier::builtin()
        }
    };

    let state = AppState {
        source,
        classifier: Arc::new(classifier),
    };

    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/summary", get(get_summary))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    source: Option<Arc<dyn RecordSource>>,
    classifier: Arc<CounterpartyClassifier>,
}

#[derive(Debug, Deserialize)]
struct SummaryParams {
    limit: Option<String>,
}

#[derive(Debug, Serialize)]
struct SummaryBody {
    success: bool,
    data: Vec<SummaryRecord>,
    limit: WindowSize,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

fn error_response(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            success: false,
            error: message,
        }),
    )
        .into_response()
}

async fn get_summary(State(state): State<AppState>, Query(params): Query<SummaryParams>) -> Response {
    let window = WindowSize::from_param(params.limit.as_deref());

    let Some(source) = &state.source else {
        return error_response("record source not configured".to_string());
    };

    match hitrate_core::aggregate::load_summary(source.as_ref(), window, &state.classifier).await {
        Ok(data) => Json(SummaryBody {
            success: true,
            data,
            limit: window,
        })
        .into_response(),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, window = window.get(), "summary failed");
            error_response(format!("{e:#}"))
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
