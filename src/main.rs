use config::Config;
use constants::STARTUP_TIME;

mod config;
mod constants;
mod discord;
mod error;
mod gate;
mod init;
mod models;
mod routes;
mod store;
mod telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let _ = &*STARTUP_TIME;

    let telemetry = telemetry::init_telemetry()?;

    let result = match Config::from_env() {
        Ok(config) => init::init(config).await,
        Err(e) => Err(e),
    }
    .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when running steno"));

    telemetry.shutdown();
    result
}
