//! Signed session tokens.
//!
//! Login and signup return an HS256 JWT carrying the user id, role, and
//! organization id. The auth gate verifies signature and expiry on every
//! request and turns the claims into an [`Identity`]. There is no session
//! store: a token is valid until it expires.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;
use crate::models::{Role, User};

/// Default token lifetime: one day.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 86_400;

/// Who is making a request. Attached to every authenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
}

impl Identity {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    pub privilege: Role,
    pub organization_id: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies session tokens with a shared secret.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Create a signer. `ttl_secs` is the lifetime of issued tokens.
    #[must_use]
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Issue a token for `user`, valid from now.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Signing`] if encoding fails.
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        self.issue_at(user, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Signing`] if encoding fails.
    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user.id,
            privilege: user.role,
            organization_id: user.organization_id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(
            |e| AuthError::Signing {
                reason: e.to_string(),
            },
        )
    }

    /// Verify a token's signature and expiry and return its identity.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Expired`] if `exp` is in the past.
    /// - [`AuthError::InvalidToken`] for anything else wrong with it.
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken {
                    reason: e.to_string(),
                },
            })?;

        Ok(Identity {
            user_id: data.claims.sub,
            organization_id: data.claims.organization_id,
            role: data.claims.privilege,
        })
    }
}

/// Extract the token from an `Authorization` header value.
///
/// Accepts `Bearer <token>` as well as a bare token.
///
/// # Errors
///
/// Returns [`AuthError::MissingToken`] if the header is absent or empty.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.unwrap_or_default();
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}
