use rocket::{
    http::Status,
    request::{self, FromRequest},
    Request,
};

use super::{AuthError, Claims, Verifier};
use crate::logging::record_subject;

/// Cookie that may carry the ID token instead of the `Authorization` header.
pub const SESSION_COOKIE: &str = "__session";

const BEARER_PREFIX: &str = "Bearer ";

/// Proof that the request carried a valid ID token.
///
/// As a request guard, this fails with `403 Forbidden` when no token is
/// presented or verification fails.
#[derive(Debug, Clone)]
pub struct AuthToken {
    claims: Claims,
}

impl AuthToken {
    /// Get the authenticated user's ID.
    pub fn user_id(&self) -> &str {
        self.claims.user_id()
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }
}

/// Pull the raw token out of the request, preferring the bearer header.
fn presented_token(req: &Request<'_>) -> Option<String> {
    let bearer = req
        .headers()
        .get_one("Authorization")
        .and_then(|header| header.strip_prefix(BEARER_PREFIX));
    if let Some(token) = bearer {
        trace!("Found bearer token");
        return Some(token.to_string());
    }
    req.cookies()
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = AuthError;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let verifier = match req.rocket().state::<Verifier>() {
            Some(verifier) => verifier,
            None => {
                error!("No identity verifier is managed");
                return request::Outcome::Failure((
                    Status::InternalServerError,
                    AuthError::Unavailable,
                ));
            }
        };

        let token = match presented_token(req) {
            Some(token) => token,
            None => {
                warn!("No ID token passed as a bearer token or `{SESSION_COOKIE}` cookie");
                return request::Outcome::Failure((
                    Status::Forbidden,
                    AuthError::MissingCredentials,
                ));
            }
        };

        match verifier.verify(&token).await {
            Ok(claims) => {
                debug!("ID token verified for {}", claims.user_id());
                record_subject(req, claims.user_id());
                request::Outcome::Success(AuthToken { claims })
            }
            Err(e) => {
                warn!("Error while verifying ID token: {e}");
                request::Outcome::Failure((Status::Forbidden, e))
            }
        }
    }
}
