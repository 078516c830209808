use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use api_shared::{DenyAllVerifier, JwksVerifier, SharedVerifier};
use consult_core::{
    AzureOpenAiBackend, ConsultationService, RelayOptions, ServerConfig, UpstreamConfig,
};

/// Main entry point for the consultation summary server
///
/// Serves the REST API, including the streaming `/api/consultation` endpoint, and the
/// frontend bundle when one is present.
///
/// # Environment Variables
/// - `CONSULT_REST_ADDR`: REST server address (default: "0.0.0.0:8000")
/// - `CONSULT_STATIC_DIR`: frontend bundle directory (default: "static")
/// - `CLERK_JWKS_URL`: key set used to verify bearer tokens
/// - `CONSULT_DONE_MARKER`: end successful streams with an explicit `done` event
/// - `AZURE_OPENAI_ENDPOINT`, `AZURE_OPENAI_API_KEY`, `AZURE_OPENAI_API_VERSION`,
///   `AZURE_OPENAI_DEPLOYMENT`: upstream provider settings, validated per request
///
/// # Returns
/// * `Ok(())` - If the server shuts down cleanly
/// * `Err(anyhow::Error)` - If startup or serving fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("consult=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server = ServerConfig::from_env()?;
    let upstream = Arc::new(UpstreamConfig::from_env());
    if let Err(e) = upstream.validate() {
        // Requests are rejected with this message until the environment is fixed.
        tracing::warn!("upstream provider not ready: {}", e);
    }

    let backend = Arc::new(AzureOpenAiBackend::new()?);
    let consultations = ConsultationService::new(upstream, backend).with_relay_options(RelayOptions {
        done_marker: server.done_marker(),
    });
    tracing::info!(
        "using {} backend (done marker {})",
        consultations.backend_name(),
        if server.done_marker() { "on" } else { "off" }
    );

    let verifier: SharedVerifier = match server.jwks_url() {
        Some(url) => Arc::new(JwksVerifier::new(reqwest::Client::new(), url)),
        None => {
            tracing::warn!("CLERK_JWKS_URL not set, /api/consultation will reject every request");
            Arc::new(DenyAllVerifier)
        }
    };

    let app = router(
        AppState {
            consultations,
            verifier,
        },
        Some(server.static_dir()),
    );

    tracing::info!("++ Starting consultation REST on {}", server.rest_addr());

    let listener = tokio::net::TcpListener::bind(server.rest_addr()).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
