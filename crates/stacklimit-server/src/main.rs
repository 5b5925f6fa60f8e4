use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use stacklimit_exporter::{ExporterState, exporter_router};
use stacklimit_openstack::{CloudConfFile, Connector, KeystoneConnector};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stacklimit", about = "Prometheus exporter for OpenStack compute and volume limits")]
struct Cli {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value = "9183")]
    port: u16,

    /// INI file with a [Global] section; re-read on every scrape.
    #[arg(long, default_value = "cloud.conf")]
    config: PathBuf,

    /// Upper bound for each call to the control plane.
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Reuse identity tokens for this many seconds; 0 authenticates on every scrape.
    #[arg(long, default_value_t = 0)]
    session_ttl_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::from_default_env().add_directive("stacklimit=info".parse()?);
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    if cli.timeout_secs == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "--timeout-secs must be greater than zero",
        )
        .into());
    }

    if !cli.config.exists() {
        warn!(path = %cli.config.display(), "config file not found yet; scrapes will fail until it exists");
    }
    let config_source = Arc::new(CloudConfFile::new(
        cli.config.clone(),
        Duration::from_secs(cli.timeout_secs),
    ));

    let connector: Arc<dyn Connector> = if cli.session_ttl_secs > 0 {
        info!(ttl_secs = cli.session_ttl_secs, "identity token cache enabled");
        Arc::new(KeystoneConnector::with_session_cache(Duration::from_secs(
            cli.session_ttl_secs,
        )))
    } else {
        Arc::new(KeystoneConnector::new())
    };

    let state = Arc::new(ExporterState::new(config_source, connector));
    let app = exporter_router(state);

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(config = %cli.config.display(), "stacklimit exporter listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
