use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use revrec_core::domain::contract::ContractIn;
use revrec_core::engine::error::EngineError;

#[derive(Debug, Parser)]
#[command(name = "revrec_cli")]
struct Args {
    /// Path to a contract JSON file (same shape as the /contracts/allocate body).
    #[arg(long)]
    input: std::path::PathBuf,

    /// Pretty-print the result.
    #[arg(long)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = revrec_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("read {}", args.input.display()))?;
    let parsed: ContractIn = serde_json::from_str(&raw)
        .with_context(|| format!("parse contract JSON from {}", args.input.display()))?;

    let contract = parsed.validate_and_into_contract()?;

    match revrec_core::engine::allocate_and_schedule(&contract) {
        Ok(outcome) => {
            let json = if args.pretty {
                serde_json::to_string_pretty(&outcome)?
            } else {
                serde_json::to_string(&outcome)?
            };
            println!("{json}");
            tracing::info!(
                contract_id = %contract.contract_id,
                pos = contract.pos.len(),
                "allocation complete"
            );
            Ok(())
        }
        Err(err) => {
            let err = anyhow::Error::new(err);
            // Consistency failures are defects worth reporting; validation
            // failures are the caller's input.
            if err
                .downcast_ref::<EngineError>()
                .is_some_and(|e| !e.is_validation())
            {
                sentry_anyhow::capture_anyhow(&err);
            }
            Err(err)
        }
    }
}

fn init_sentry(settings: &revrec_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
