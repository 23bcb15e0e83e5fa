//! Authentication boundary
//!
//! Requests carry HTTP Basic credentials where the username names a
//! configured principal and the password is a JWT signed with that
//! principal's secret; the token's `sub` claim must equal the username.
//! Past this middleware every request is associated with a verified
//! principal and the core never re-checks identity.

use crate::errors::{BridgeError, Result};
use crate::server::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// JWT claims accepted by the gateway
///
/// `exp` is optional and only enforced when present, matching the
/// original deployment's token acceptance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject; must equal the authenticating username
    pub sub: String,

    /// Expiration time (Unix timestamp), enforced when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,

    /// Issued at (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
}

/// The configured principals: username to JWT signing secret
#[derive(Debug, Clone, Default)]
pub struct AcceptedUsers {
    users: HashMap<String, String>,
}

impl AcceptedUsers {
    pub fn new(users: HashMap<String, String>) -> Self {
        Self { users }
    }

    /// Whether any principal is configured
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Validate a token for a username and return the verified subject.
    pub fn validate(&self, username: &str, token: &str) -> Result<String> {
        let secret = self
            .users
            .get(username)
            .ok_or_else(|| BridgeError::Auth(format!("unknown user '{username}'")))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|e| BridgeError::Auth(format!("invalid token: {e}")))?;

        let claims = token_data.claims;

        if let Some(exp) = claims.exp {
            let now = chrono::Utc::now().timestamp() as u64;
            if exp < now {
                return Err(BridgeError::Auth("token expired".to_string()));
            }
        }

        if claims.sub != username {
            return Err(BridgeError::Auth(
                "token subject does not match user".to_string(),
            ));
        }

        Ok(claims.sub)
    }
}

/// Generate a cryptographically random secret.
///
/// Minimum length is 12 characters.
pub fn generate_secure_password(length: usize) -> Result<String> {
    if length < 12 {
        return Err(BridgeError::Auth(
            "password length must be at least 12 characters".to_string(),
        ));
    }

    const LETTERS_AND_DIGITS: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%&*";

    let mut raw = vec![0u8; length];
    rand::rngs::OsRng.fill_bytes(&mut raw);

    let password: String = raw
        .iter()
        .map(|&b| LETTERS_AND_DIGITS[b as usize % LETTERS_AND_DIGITS.len()] as char)
        .collect();

    Ok(password)
}

/// Parse HTTP Basic credentials from an Authorization header value.
pub fn parse_basic_credentials(auth_header: &str) -> Option<(String, String)> {
    let encoded = auth_header
        .strip_prefix("Basic ")
        .or_else(|| auth_header.strip_prefix("basic "))?;

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Authentication middleware guarding every route.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> std::result::Result<Response, Response> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some((username, token)) = header_value.and_then(parse_basic_credentials) else {
        return Err(unauthorized());
    };

    match state.users.validate(&username, &token) {
        Ok(subject) => {
            tracing::debug!(user = %subject, "request authenticated");
            Ok(next.run(request).await)
        }
        Err(err) => {
            tracing::warn!(user = %username, error = %err, "authentication rejected");
            Err(unauthorized())
        }
    }
}

fn unauthorized() -> Response {
    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(header::WWW_AUTHENTICATE, "Basic realm=\"Restricted\"")
        .body("Unauthorized".into())
        .unwrap_or_else(|_| StatusCode::UNAUTHORIZED.into_response())
}
