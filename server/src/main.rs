use anyhow::Result;
use axum::Router;
use clap::Parser;
use server::{build_app, ServerConfig};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Results returned when a request has no `k`
    #[arg(long, default_value_t = kbsearch_core::DEFAULT_LIMIT)]
    default_limit: usize,
    /// Upper bound for `k`
    #[arg(long, default_value_t = 100)]
    max_limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    if args.default_limit == 0 || args.max_limit == 0 {
        anyhow::bail!("--default-limit and --max-limit must be positive");
    }
    let config = ServerConfig {
        default_limit: args.default_limit,
        max_limit: args.max_limit,
        ..ServerConfig::new(&args.index)
    }
    .with_env();
    let app: Router = build_app(config);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
