use axum::{
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use revrec_core::config::Settings;
use revrec_core::domain::allocation::AllocationOutcome;
use revrec_core::domain::contract::ContractIn;
use revrec_core::engine::amortize::{amortize_cost, AmortizationMethod, AmortizationResult};
use revrec_core::engine::error::EngineError;
use revrec_core::time::period::Period;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/contracts/allocate", post(contracts_allocate))
        .route("/costs/amortize", post(costs_amortize))
        .layer(cors_layer(&settings))
        .layer(TraceLayer::new_for_http());

    let port = settings.port.unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

async fn contracts_allocate(
    Json(body): Json<ContractIn>,
) -> Result<Json<AllocationOutcome>, ApiError> {
    let contract = body.validate_and_into_contract().map_err(engine_error)?;
    let outcome = revrec_core::engine::allocate_and_schedule(&contract).map_err(engine_error)?;
    Ok(Json(outcome))
}

/// Body of `/costs/amortize`. The UI posts the weight curve as either
/// `curve` or `percent_complete` depending on the chosen method.
#[derive(Debug, Deserialize)]
struct AmortizeIn {
    total: Decimal,
    months: u32,
    start: NaiveDate,
    #[serde(default = "default_amortize_method")]
    method: AmortizationMethod,
    #[serde(default, alias = "percent_complete")]
    curve: Option<Vec<f64>>,
}

fn default_amortize_method() -> AmortizationMethod {
    AmortizationMethod::StraightLine
}

async fn costs_amortize(
    Json(body): Json<AmortizeIn>,
) -> Result<Json<AmortizationResult>, ApiError> {
    let result = amortize_cost(
        body.total,
        body.months,
        Period::from_date(body.start),
        body.method,
        body.curve.as_deref(),
    )
    .map_err(engine_error)?;
    Ok(Json(result))
}

fn engine_error(err: EngineError) -> ApiError {
    let status = if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        // Sum invariants broke after rounding; a defect, not bad input.
        sentry_anyhow::capture_anyhow(&anyhow::Error::new(err.clone()));
        tracing::error!(error = %err, "engine consistency failure");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match settings.allowed_origins.as_deref() {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            layer.allow_origin(origins)
        }
        None => layer.allow_origin(Any),
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
