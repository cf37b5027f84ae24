/// Beacon command-line resolver
///
/// Usage: beacon <actor> [identity|did|handle|pds]

use beacon::{Beacon, BeaconConfig, BeaconError, BeaconResult};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: beacon <actor> [identity|did|handle|pds]";

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (actor, mode) = match args.as_slice() {
        [actor] => (actor.as_str(), "identity"),
        [actor, mode] => (actor.as_str(), mode.as_str()),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    match run(actor, mode).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("error: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run(actor: &str, mode: &str) -> BeaconResult<Value> {
    let config = BeaconConfig::from_env()?;
    info!(
        "Resolving {} ({}) via {} / {}",
        actor, mode, config.plc_directory, config.pds_endpoint
    );

    let beacon = Beacon::from_config(&config).await?;

    let output = match mode {
        "identity" => to_json(beacon.resolve_identity(actor, true).await?)?,
        "did" => to_json(beacon.resolve_did(actor, true).await?)?,
        "handle" => json!({ "handle": actor, "did": beacon.handle_to_did(actor, true).await? }),
        "pds" => json!({ "actor": actor, "pds": beacon.resolve_pds(actor, true).await? }),
        other => {
            return Err(BeaconError::Config(format!("Unknown mode {:?}; {}", other, USAGE)));
        }
    };

    Ok(output)
}

fn to_json<T: serde::Serialize>(value: T) -> BeaconResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| BeaconError::Config(format!("Failed to serialize output: {}", e)))
}
