#[macro_use]
extern crate rocket;
#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{
    data::{ByteUnit, Limits, ToByteUnit},
    figment::Figment,
    Build, Rocket,
};

use crate::config::{ConfigFairing, DatabaseFairing, IdentityFairing, StorageFairing};
use crate::cors::CorsFairing;
use crate::logging::LoggerFairing;
use crate::model::{auth::Verifier, storage::Storage, store::Store};

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod cors;
pub mod error;
pub mod logging;
pub mod model;

/// Every route is served under this base path.
pub const BASE_PATH: &str = "/api";

/// Avatars up to this many MiB are always accepted by `update-user-profile`.
pub const AVATAR_LIMIT_MIB: u64 = 10;

/// Rocket's configuration sources, with body limits raised far enough for
/// avatar uploads. Configured limits above the floor are kept.
fn figment() -> Figment {
    let figment = rocket::Config::figment();
    let configured = figment
        .extract_inner::<Limits>("limits")
        .unwrap_or_default();
    let at_least = |name: &str, floor: ByteUnit| {
        configured
            .get(name)
            .map_or(floor, |limit| limit.max(floor))
    };
    let limits = configured
        .clone()
        .limit("file", at_least("file", AVATAR_LIMIT_MIB.mebibytes()))
        .limit("data-form", at_least("data-form", (AVATAR_LIMIT_MIB + 1).mebibytes()));
    figment.merge(("limits", limits))
}

/// The application without its external services.
fn base() -> Rocket<Build> {
    rocket::custom(figment())
        .mount(BASE_PATH, api::routes())
        .mount(BASE_PATH, cors::routes())
        .register(BASE_PATH, api::catchers())
        .attach(LoggerFairing)
        .attach(CorsFairing)
        .attach(ConfigFairing)
}

/// Build the server, connecting to the services named in the configuration
/// during ignition.
pub fn build() -> Rocket<Build> {
    base()
        .attach(DatabaseFairing)
        .attach(IdentityFairing)
        .attach(StorageFairing)
}

/// Build the server over already-constructed services.
pub fn rocket_for_services(store: Store, verifier: Verifier, storage: Storage) -> Rocket<Build> {
    base().manage(store).manage(verifier).manage(storage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_limits_fit_avatars() {
        let limits = figment().extract_inner::<Limits>("limits").unwrap();
        assert!(limits.get("file").unwrap() >= AVATAR_LIMIT_MIB.mebibytes());
        assert!(limits.get("data-form").unwrap() > AVATAR_LIMIT_MIB.mebibytes());
        // Untouched limits keep Rocket's defaults.
        assert_eq!(limits.get("json"), Limits::default().get("json"));
    }
}
