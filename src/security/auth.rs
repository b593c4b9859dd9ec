//! Bearer-token gate.
//!
//! # State machine: Anonymous | Authenticated | Rejected
//! - No `Authorization` header → Anonymous: the request proceeds with no
//!   injected identity, so public endpoints share the same ingress
//! - Header present → the token must validate (signature, issuer,
//!   audience, expiry, zero clock skew); success attaches the claims,
//!   failure answers 401 before any downstream contact
//!
//! # Design Decisions
//! - The gateway never enforces per-route roles; downstream re-derives
//!   authorization from the forwarded token

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::schema::AuthConfig;
use crate::error::GatewayError;

/// Claims carried by a validated token. Attached to the request
/// extensions for the rest of the chain (the rate limiter keys on `sub`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
    pub iss: String,
    pub aud: String,
}

/// Compiled validation policy.
pub struct AuthPolicy {
    key: Option<(DecodingKey, Validation)>,
}

impl AuthPolicy {
    /// Build the policy. With no `[auth]` section configured, any offered
    /// token is rejected: the gateway cannot vouch for what it cannot
    /// verify.
    pub fn from_config(config: Option<&AuthConfig>) -> Self {
        let key = config.map(|auth| {
            let mut validation = Validation::new(Algorithm::HS256);
            validation.leeway = 0;
            validation.set_issuer(&[&auth.issuer]);
            validation.set_audience(&[&auth.audience]);
            validation.set_required_spec_claims(&["exp", "iss", "aud"]);

            (DecodingKey::from_secret(auth.signing_key.as_bytes()), validation)
        });

        Self { key }
    }

    fn validate(&self, token: &str) -> Result<Claims, GatewayError> {
        let (key, validation) = self.key.as_ref().ok_or(GatewayError::AuthRejected)?;
        decode::<Claims>(token, key, validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token validation failed");
                GatewayError::AuthRejected
            })
    }
}

/// Middleware implementing the optional-token gate.
pub async fn auth_gate(
    State(policy): State<Arc<AuthPolicy>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let Some(header) = header else {
        // Anonymous pass-through: absence of a token is never an error.
        return next.run(request).await;
    };

    let token = match header.strip_prefix("Bearer ") {
        Some(token) if !token.is_empty() => token,
        _ => return GatewayError::AuthRejected.into_response(),
    };

    match policy.validate(token) {
        Ok(claims) => {
            tracing::debug!(subject = %claims.sub, "Token validated");
            request.extensions_mut().insert(claims);
            // The Authorization header is forwarded unchanged; downstream
            // re-derives role checks independently.
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
