use std::net::IpAddr;

use clap::Parser;
use kcaltrack_identity::config::Config;
use kcaltrack_identity::observability::init_observability;
use kcaltrack_identity::server::run_server;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "kcaltrack-identity")]
#[command(about = "Identity resolution and session completion service", long_about = None)]
#[command(version)]
struct Args {
    /// HTTP bind host
    #[arg(long, env = "KCAL_HTTP_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// HTTP bind port
    #[arg(long, env = "KCAL_HTTP_PORT", default_value = "8080")]
    port: u16,

    /// Exact origin of the opener application (CORS and broadcast target)
    #[arg(long, env = "KCAL_OPENER_ORIGIN", default_value = "http://localhost:3000")]
    opener_origin: String,

    /// Token introspection endpoint of the federated identity provider
    #[arg(long, env = "KCAL_INTROSPECTION_URL")]
    introspection_url: Option<Url>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable JSON logging output
    #[arg(long, env = "KCAL_JSON_LOGS")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config {
        host: args.host,
        port: args.port,
        opener_origin: args.opener_origin,
        introspection_url: args.introspection_url,
        ..Config::default()
    };
    if args.verbose {
        config = config.with_log_level("debug");
    }
    config.json_logs = args.json_logs;

    init_observability(&config);

    tracing::info!("Starting identity service");
    tracing::info!("Opener origin: {}", config.opener_origin);
    tracing::info!(
        "Token introspection: {}",
        config
            .introspection_url
            .as_ref()
            .map_or("disabled", |_| "enabled")
    );

    let shutdown = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        tracing::info!("Shutdown signal received");
    };

    run_server(config, shutdown).await.map_err(Into::into)
}
