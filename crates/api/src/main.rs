use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;

use keygate_api::app::{build_app, services::build_services};
use keygate_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    keygate_observability::init();

    let config = ApiConfig::from_env();
    let services = build_services(&config).await?;

    if let Some(boot) = &services.bootstrapped {
        // Shown once; only the digest is stored.
        tracing::warn!(
            domain = %boot.domain,
            client_id = %boot.client_id,
            client_secret = %boot.client_secret,
            "bootstrap application registered"
        );
    }

    let app = build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
