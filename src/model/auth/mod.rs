mod claims;
mod token;
mod verifier;

pub use claims::Claims;
pub use token::{AuthToken, SESSION_COOKIE};
pub use verifier::{
    AuthError, IdentityVerifier, JwtVerifier, Verifier, DEFAULT_JWKS_URL, ISSUER_PREFIX,
};

#[cfg(test)]
pub use verifier::testing;
