//! Data model and the external capabilities it is persisted through.

pub mod api;
pub mod auth;
pub mod question;
pub mod storage;
pub mod store;
pub mod user;
