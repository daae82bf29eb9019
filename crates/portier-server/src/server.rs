//! Portier HTTP server

use axum::{middleware, routing::get, Router};
use portier_auth::Authenticator;
use portier_core::{config::PortierConfig, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::info;

use crate::middleware::{basic_auth, AuthState};
use crate::routes;

/// Portier server
pub struct PortierServer {
    config: PortierConfig,
    authenticator: Arc<Authenticator>,
}

impl PortierServer {
    /// Build a server verifying against the configured LDAP directory
    pub fn new(config: PortierConfig) -> Self {
        let authenticator = Arc::new(Authenticator::from_config(&config));
        Self {
            config,
            authenticator,
        }
    }

    pub fn with_authenticator(config: PortierConfig, authenticator: Arc<Authenticator>) -> Self {
        Self {
            config,
            authenticator,
        }
    }

    pub async fn run(self) -> Result<()> {
        self.config.validate()?;

        let app = self.router();
        let addr = format!("{}:{}", self.config.server.bind_address, self.config.server.port);
        let listener = TcpListener::bind(&addr).await?;

        info!("Portier listening on http://{}", addr);
        info!(
            "Directory: {} ({})",
            self.config.directory.url,
            self.authenticator.verifier_name()
        );
        match self.authenticator.cache() {
            Some(cache) => info!(
                "Credential cache: {} entries, ttl {:?}",
                cache.capacity(),
                cache.ttl()
            ),
            None => info!("Credential cache disabled"),
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Portier stopped");
        Ok(())
    }

    pub fn router(&self) -> Router {
        let state = AuthState::new(self.authenticator.clone(), &self.config.auth);

        let protected = Router::new()
            .route("/whoami", get(routes::whoami))
            .route_layer(middleware::from_fn_with_state(state, basic_auth));

        Router::new()
            // Health endpoint (no auth required)
            .route("/health", get(routes::health))
            .merge(protected)
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.server.request_timeout_secs,
            )))
            .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
