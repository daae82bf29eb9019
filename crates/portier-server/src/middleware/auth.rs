//! Basic authentication middleware
//!
//! Runs the [`Authenticator`] on every request of the protected router and
//! maps its decision onto a response. Allowed requests continue with an
//! [`Identity`] in their extensions.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use portier_auth::{Authenticator, AuthorizationDecision};
use portier_core::config::{AuthConfig, DenyMode};
use std::sync::Arc;
use tracing::{debug, warn};

/// State shared by the auth middleware
#[derive(Clone)]
pub struct AuthState {
    pub authenticator: Arc<Authenticator>,
    pub challenge: Option<HeaderValue>,
    pub deny_mode: DenyMode,
}

impl AuthState {
    pub fn new(authenticator: Arc<Authenticator>, config: &AuthConfig) -> Self {
        let challenge = config.browser_challenge.as_ref().and_then(|challenge| {
            HeaderValue::from_str(&format!("Basic realm=\"{}\"", challenge.realm))
                .map_err(|e| warn!("Ignoring unusable realm {:?}: {}", challenge.realm, e))
                .ok()
        });

        Self {
            authenticator,
            challenge,
            deny_mode: config.deny_mode,
        }
    }

    fn unauthorized(&self) -> Response {
        let mut response = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        if let Some(challenge) = &self.challenge {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, challenge.clone());
        }
        response
    }

    fn forbidden(&self) -> Response {
        match self.deny_mode {
            DenyMode::Strict => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
            DenyMode::Uniform => self.unauthorized(),
        }
    }
}

/// Basic authentication middleware
///
/// - no `Authorization` header or a foreign scheme: 401
/// - credentials present but rejected: 403 (401 in uniform mode)
pub async fn basic_auth(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let decision = state.authenticator.authenticate(request.headers()).await;

    match decision {
        AuthorizationDecision::Allowed(identity) => {
            debug!("{} {} allowed for {}", request.method(), request.uri().path(), identity.principal);
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        AuthorizationDecision::Unauthenticated(reason) => {
            debug!("{} {} unauthenticated: {}", request.method(), request.uri().path(), reason);
            state.unauthorized()
        }
        AuthorizationDecision::Forbidden(reason) => {
            debug!("{} {} forbidden: {}", request.method(), request.uri().path(), reason);
            state.forbidden()
        }
    }
}
