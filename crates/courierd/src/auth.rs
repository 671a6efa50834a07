//! Bearer token verification.
//!
//! Tokens are HMAC-signed JWTs checked against one shared secret. Anything
//! that fails verification (absent, malformed, badly signed, expired) degrades
//! to the public claim set; authorisation is left to individual handlers.

use std::fmt;

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

pub(crate) const AUTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::auth");

const ROLE_CLAIM: &str = "role";
const PUBLIC_ROLE: &str = "public";

/// Attributes describing the caller of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthClaims(Map<String, Value>);

impl AuthClaims {
    /// Claim set handed to unauthenticated callers.
    #[must_use]
    pub fn public() -> Self {
        let mut claims = Map::new();
        claims.insert(ROLE_CLAIM.to_owned(), Value::String(PUBLIC_ROLE.to_owned()));
        Self(claims)
    }

    /// Wraps an already verified claim mapping.
    #[must_use]
    pub fn from_map(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// Looks up one claim.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The `role` claim when it is a string.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.get(ROLE_CLAIM).and_then(Value::as_str)
    }

    /// Borrow the underlying mapping.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl Default for AuthClaims {
    fn default() -> Self {
        Self::public()
    }
}

/// Turns bearer tokens into claim sets.
#[derive(Clone)]
pub struct AuthResolver {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl AuthResolver {
    /// Builds a resolver for `secret`.
    ///
    /// An empty secret disables verification entirely so every caller is
    /// treated as public.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let key = (!secret.is_empty()).then(|| DecodingKey::from_secret(secret.as_bytes()));
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.required_spec_claims.clear();
        validation.validate_aud = false;
        Self { key, validation }
    }

    /// Whether tokens are checked at all.
    #[must_use]
    pub fn is_verifying(&self) -> bool {
        self.key.is_some()
    }

    /// Resolves the claims for `token`, never failing.
    #[must_use]
    pub fn resolve(&self, token: Option<&str>) -> AuthClaims {
        let Some(token) = token.map(str::trim).filter(|token| !token.is_empty()) else {
            return AuthClaims::public();
        };
        let Some(key) = self.key.as_ref() else {
            return AuthClaims::public();
        };
        match jsonwebtoken::decode::<Map<String, Value>>(token, key, &self.validation) {
            Ok(data) => AuthClaims::from_map(data.claims),
            Err(error) => {
                debug!(
                    target: AUTH_TARGET,
                    error = %error,
                    "token rejected, falling back to public claims"
                );
                AuthClaims::public()
            }
        }
    }
}

impl fmt::Debug for AuthResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResolver")
            .field("verifying", &self.is_verifying())
            .finish_non_exhaustive()
    }
}
