// ============================
// huddle-backend-lib/src/auth.rs
// ============================
//! Connection authentication.
//!
//! A credential is verified exactly once, at connection establishment,
//! before any room operation is permitted. Verification is behind the
//! [`IdentityVerifier`] trait; the default implementation validates an
//! HS256 access token carrying `sub` and `email` claims.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Who a live connection belongs to. Derived from the verified credential
/// and never re-derived from client-supplied data afterwards.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Stable user id (`sub` claim)
    pub user_id: String,
    /// Display hint (`email` claim), used when no explicit name is given
    pub display_hint: String,
}

/// Access-token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: usize,
}

/// Credential verification seam. Token minting lives elsewhere; this side
/// only decides whether a presented credential maps to an identity.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<Identity, AppError>;
}

/// HS256 token verifier
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, credential: &str) -> Result<Identity, AppError> {
        let token = credential.strip_prefix("Bearer ").unwrap_or(credential);

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::Unauthorized(e.to_string()))?;

        Ok(Identity {
            user_id: data.claims.sub,
            display_hint: data.claims.email,
        })
    }
}

/// Gate a new connection. A missing credential fails the same way a bad
/// one does; there is no retry and no partial admission.
pub async fn authenticate(
    verifier: &dyn IdentityVerifier,
    credential: Option<&str>,
) -> Result<Identity, AppError> {
    let credential = credential
        .ok_or_else(|| AppError::Unauthorized("missing credential".to_string()))?;
    verifier.verify(credential).await
}
