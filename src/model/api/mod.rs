//! API-compatible request types.
//!
//! Field names follow the client's camelCase conventions.

pub mod answer;
pub mod profile;
pub mod question;
