use clap::Parser;
use kite_gateway::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::parse();
    let _log_guard = kite_gateway::logging::init_tracing(&config.log_dir)?;

    kite_gateway::run(config).await
}
