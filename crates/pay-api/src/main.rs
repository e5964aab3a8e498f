//! # checkout-relay
//!
//! Checkout and webhook relay in front of Stripe.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export JWT_SECRET=...
//! export STRIPE_SECRET_KEY=sk_test_...
//! export STRIPE_PUBLISHABLE_KEY=pk_test_...
//! export STRIPE_WEBHOOK_SECRET=whsec_...
//!
//! # Run the server
//! checkout-relay
//! ```

use anyhow::Context;
use pay_api::{routes, telemetry, AppConfig, AppState};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    telemetry::init_tracing(&config.server, &config.log);

    print_banner();

    let addr = config.server.socket_addr()?;
    let is_release = config.server.is_release();

    info!("Mode: {}", config.server.mode.as_str());
    info!("JWT refresh enabled: {}", config.auth.refresh_enabled);
    debug!("Database: {:?}", config.database);

    let state = AppState::from_config(config).context("Failed to initialize services")?;
    let app = routes::create_router(state);

    info!("checkout-relay starting on http://{}", addr);

    if !is_release {
        info!("Health: GET http://{}/v1/health", addr);
        info!("Checkout: POST http://{}/api/v1/payments/create-checkout", addr);
        info!("Webhook: POST http://{}/webhooks/stripe", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}

fn print_banner() {
    println!(
        r#"
  checkout-relay
  ━━━━━━━━━━━━━━━━━━━━━━━
  Stripe checkout & webhooks
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
