use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use advisor_core::domain::profile::AVAILABLE_THEMES;
use advisor_core::domain::report::{AggregatedHolding, RecommendationReport};
use advisor_core::embedding::openai::OpenAiEmbeddingClient;
use advisor_core::engine::{EngineOptions, RecommendationEngine};
use advisor_core::error::FailureEnvelope;
use advisor_core::llm::anthropic::AnthropicClient;
use advisor_core::storage::knowledge::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = advisor_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let engine = match build_engine(&settings).await {
        Ok(engine) => Some(Arc::new(engine)),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "engine setup failed; starting API in degraded mode");
            None
        }
    };

    let state = AppState { engine };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/themes", get(get_themes))
        .route("/recommendations", post(post_recommendation))
        .with_state(state)
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

async fn build_engine(
    settings: &advisor_core::config::Settings,
) -> anyhow::Result<RecommendationEngine> {
    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;
    advisor_core::storage::migrate(&pool).await?;

    let store = Arc::new(PgStore::new(pool));
    let embedding = Arc::new(OpenAiEmbeddingClient::from_settings(settings)?);
    let llm = Arc::new(AnthropicClient::from_settings(settings)?);

    Ok(RecommendationEngine::new(
        embedding,
        llm,
        store.clone(),
        store,
        EngineOptions::from_env(),
    ))
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    engine: Option<Arc<RecommendationEngine>>,
}

#[derive(Debug, Serialize)]
struct ThemesResponse {
    themes: Vec<&'static str>,
}

async fn get_themes() -> Json<ThemesResponse> {
    Json(ThemesResponse {
        themes: AVAILABLE_THEMES.to_vec(),
    })
}

#[derive(Debug, Deserialize)]
struct RecommendRequest {
    themes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RecommendResponse {
    report: RecommendationReport,
    aggregated_holdings: Vec<AggregatedHolding>,
}

async fn post_recommendation(
    State(state): State<AppState>,
    Json(req): Json<RecommendRequest>,
) -> Result<Json<RecommendResponse>, (StatusCode, Json<FailureEnvelope>)> {
    let Some(engine) = &state.engine else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(FailureEnvelope {
                error: "recommendation engine is unavailable".to_string(),
                raw_output: None,
            }),
        ));
    };

    let themes: Vec<String> = req
        .themes
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if themes.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(FailureEnvelope {
                error: "at least one theme is required".to_string(),
                raw_output: None,
            }),
        ));
    }

    let request_id = Uuid::new_v4();
    tracing::info!(%request_id, themes = ?themes, "recommendation request");

    let report = engine
        .recommend(&themes)
        .await
        .map_err(|err| fail(request_id, err))?;

    let aggregated_holdings = engine
        .aggregate(&report)
        .await
        .map_err(|err| fail(request_id, err))?;

    tracing::info!(
        %request_id,
        portfolio = report.portfolio.len(),
        holdings = aggregated_holdings.len(),
        "recommendation generated"
    );

    Ok(Json(RecommendResponse {
        report,
        aggregated_holdings,
    }))
}

fn fail(
    request_id: Uuid,
    err: advisor_core::error::EngineError,
) -> (StatusCode, Json<FailureEnvelope>) {
    let status = if err.is_infrastructure() {
        sentry_anyhow::capture_anyhow(&anyhow::Error::new(err.clone()));
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };

    tracing::error!(%request_id, kind = err.kind(), error = %err, "recommendation failed");
    (status, Json(err.to_envelope()))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &advisor_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
