use std::net::SocketAddr;
use std::path::PathBuf;

use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dirshare::{AppState, Config};

#[derive(Parser, Debug)]
#[command(name = "dirshare")]
#[command(about = "Browse, upload and delete files of a directory over HTTP")]
#[command(version)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "DIRSHARE_PORT", default_value = "8080")]
    port: u16,

    /// Address to bind to
    #[arg(short, long, env = "DIRSHARE_BIND", default_value = "0.0.0.0")]
    bind: String,

    /// Root directory to serve files from
    #[arg(short, long, env = "DIRSHARE_DIR", default_value = "./")]
    dir: PathBuf,

    /// Serve over HTTPS
    #[arg(long, env = "DIRSHARE_HTTPS")]
    https: bool,

    /// HTTPS certificate file (PEM)
    #[arg(long, env = "DIRSHARE_CERT", default_value = "server.crt")]
    cert: PathBuf,

    /// HTTPS private key file (PEM)
    #[arg(long, env = "DIRSHARE_KEY", default_value = "server.key")]
    key: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, env = "DIRSHARE_VERBOSE")]
    verbose: bool,

    /// Config file path (optional)
    #[arg(short, long, env = "DIRSHARE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "dirshare=debug,tower_http=debug"
    } else {
        "dirshare=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config from file if provided, otherwise use defaults
    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    if !cli.dir.exists() {
        return Err(format!("Root directory does not exist: {}", cli.dir.display()).into());
    }

    let root_dir = cli.dir.canonicalize()?;

    if !root_dir.is_dir() {
        return Err(format!("Root path is not a directory: {}", root_dir.display()).into());
    }

    let state = AppState::with_config(root_dir.clone(), config).with_tls(cli.https);
    let app = dirshare::app(state);

    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port).parse()?;
    info!(
        "Serving {} on {} port {} dir {} ...",
        if cli.https { "HTTPS" } else { "HTTP" },
        cli.bind,
        cli.port,
        root_dir.display()
    );

    if cli.https {
        let tls_config = RustlsConfig::from_pem_file(&cli.cert, &cli.key)
            .await
            .map_err(|err| {
                format!(
                    "Failed to load TLS certificate {} / key {}: {}",
                    cli.cert.display(),
                    cli.key.display(),
                    err
                )
            })?;
        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
    }

    Ok(())
}
