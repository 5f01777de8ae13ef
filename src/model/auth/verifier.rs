use std::sync::Arc;

use jsonwebtoken::{
    decode, decode_header,
    errors::Error as JwtError,
    jwk::JwkSet,
    Algorithm, DecodingKey, Validation,
};
use reqwest::Client;
use rocket::tokio::sync::RwLock;
use thiserror::Error;

use super::Claims;

/// Where the identity provider publishes its token signing keys.
pub const DEFAULT_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Issuer of ID tokens is this prefix followed by the project ID.
pub const ISSUER_PREFIX: &str = "https://securetoken.google.com/";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No credentials presented")]
    MissingCredentials,
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] JwtError),
    #[error("Token signed with unknown key {0:?}")]
    UnknownKey(Option<String>),
    #[error("Failed to fetch signing keys: {0}")]
    KeyFetch(#[from] reqwest::Error),
    #[error("Identity verification is not configured")]
    Unavailable,
}

/// The identity capability: verify a presented token, yielding its claims.
#[rocket::async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Claims, AuthError>;
}

/// The verifier handle placed into managed state.
pub type Verifier = Arc<dyn IdentityVerifier>;

enum Keys {
    /// A shared HS256 secret.
    Secret(DecodingKey),
    /// RS256 keys from a JWK set, fetched lazily and refreshed when a token
    /// names a key we haven't seen.
    Jwks {
        url: String,
        client: Client,
        cache: RwLock<Option<JwkSet>>,
    },
}

/// Verifies JWT ID tokens.
pub struct JwtVerifier {
    keys: Keys,
    validation: Validation,
}

impl JwtVerifier {
    /// Verify HS256 tokens signed with the given secret.
    pub fn with_secret(secret: &[u8], project_id: Option<&str>) -> Self {
        Self {
            keys: Keys::Secret(DecodingKey::from_secret(secret)),
            validation: validation(Algorithm::HS256, project_id),
        }
    }

    /// Verify RS256 tokens against the JWK set published at `url`.
    pub fn with_jwks(url: impl Into<String>, project_id: Option<&str>) -> Self {
        Self {
            keys: Keys::Jwks {
                url: url.into(),
                client: Client::new(),
                cache: RwLock::new(None),
            },
            validation: validation(Algorithm::RS256, project_id),
        }
    }

    /// Find the decoding key for the given token.
    async fn key_for(&self, token: &str) -> Result<DecodingKey, AuthError> {
        let (url, client, cache) = match &self.keys {
            Keys::Secret(key) => return Ok(key.clone()),
            Keys::Jwks { url, client, cache } => (url, client, cache),
        };

        let kid = decode_header(token)?.kid;
        let kid = kid.ok_or(AuthError::UnknownKey(None))?;

        if let Some(jwks) = cache.read().await.as_ref() {
            if let Some(jwk) = jwks.find(&kid) {
                return Ok(DecodingKey::from_jwk(jwk)?);
            }
        }

        // Keys rotate; fetch the current set once before giving up.
        debug!("Fetching signing keys from {url}");
        let jwks: JwkSet = client
            .get(url.as_str())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let key = jwks.find(&kid).map(DecodingKey::from_jwk).transpose()?;
        *cache.write().await = Some(jwks);
        key.ok_or(AuthError::UnknownKey(Some(kid)))
    }
}

fn validation(algorithm: Algorithm, project_id: Option<&str>) -> Validation {
    let mut validation = Validation::new(algorithm);
    if let Some(project_id) = project_id {
        validation.set_audience(&[project_id]);
        validation.set_issuer(&[format!("{ISSUER_PREFIX}{project_id}")]);
    }
    validation
}

#[rocket::async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let key = self.key_for(token).await?;
        let data = decode::<Claims>(token, &key, &self.validation)?;
        Ok(data.claims)
    }
}


#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::testing::*;
    use super::*;

    #[rocket::async_test]
    async fn accepts_valid_token() {
        let claims = verifier().verify(&token_for("u1")).await.unwrap();
        assert_eq!(claims.user_id(), "u1");
    }

    #[rocket::async_test]
    async fn rejects_expired_token() {
        let token = token_with("u1", TEST_PROJECT, Duration::hours(-2));
        assert!(matches!(
            verifier().verify(&token).await,
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[rocket::async_test]
    async fn rejects_other_project() {
        let token = token_with("u1", "someone-else", Duration::hours(1));
        assert!(matches!(
            verifier().verify(&token).await,
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[rocket::async_test]
    async fn rejects_garbage() {
        assert!(verifier().verify("not.a.token").await.is_err());
        let other = JwtVerifier::with_secret(b"another-secret", Some(TEST_PROJECT));
        assert!(other.verify(&token_for("u1")).await.is_err());
    }

    #[rocket::async_test]
    async fn jwks_mode_requires_key_id() {
        // HS256 test tokens carry no `kid`, so no key lookup is attempted.
        let jwks = JwtVerifier::with_jwks("http://127.0.0.1:9/keys", Some(TEST_PROJECT));
        assert!(matches!(
            jwks.verify(&token_for("u1")).await,
            Err(AuthError::UnknownKey(None))
        ));
    }
}
