use color_eyre::eyre::{Result, WrapErr};
use reqecho::http::{HttpConfig, HttpEchoServer};
use reqecho::EchoServerTrait;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("reqecho=info")
        .init();

    let config = HttpConfig::default();
    let server = HttpEchoServer::bind(config.clone())
        .await
        .wrap_err_with(|| format!("Failed to bind {}", config.bind_addr))?;

    info!(
        address = %server.local_addr()?,
        max_connections = config.max_connections,
        "Starting HTTP echo server"
    );
    server.run().await.wrap_err("Failed to run HTTP echo server")?;

    Ok(())
}
