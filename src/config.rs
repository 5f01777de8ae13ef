use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::{de::DeserializeOwned, Deserialize};

use crate::model::{
    auth::{JwtVerifier, Verifier, DEFAULT_JWKS_URL},
    storage::{CloudStorage, MemoryStorage, Storage},
    store::{MemoryStore, MongoStore, Store},
};

/// Setting `db_uri` to this selects the in-process store.
pub const MEMORY_DB_URI: &str = "memory";

/// Setting `storage_api_url` to this selects the in-process object storage.
pub const MEMORY_STORAGE_URL: &str = "memory";

/// Tunables for request handling, read from `Rocket.toml` / `ROCKET_*`.
/// Every field has a default. Handlers reach it as `&State<Config>`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_upload_dir")]
    upload_dir: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    storage_poll_interval_ms: u64,
    #[serde(default = "default_poll_attempts")]
    storage_poll_attempts: u32,
}

fn default_upload_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_poll_attempts() -> u32 {
    20
}

impl Config {
    /// Directory uploads are staged in before going to object storage.
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Delay between checks that an uploaded object is available.
    pub fn storage_poll_interval(&self) -> Duration {
        Duration::from_millis(self.storage_poll_interval_ms)
    }

    /// How many times to check that an uploaded object is available before
    /// giving up.
    pub fn storage_poll_attempts(&self) -> u32 {
        self.storage_poll_attempts
    }
}

/// Extract one concern's settings from the figment, logging why if we can't.
fn extract<T: DeserializeOwned>(rocket: &Rocket<Build>, concern: &str) -> Option<T> {
    match rocket.figment().extract::<T>() {
        Ok(config) => Some(config),
        Err(e) => {
            error!("Invalid {concern} settings");
            rocket::config::pretty_print_error(e);
            None
        }
    }
}

/// Loads [`Config`] into managed state and prepares the upload directory.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let Some(config) = extract::<Config>(&rocket, "application") else {
            return Err(rocket);
        };
        if let Err(e) = rocket::tokio::fs::create_dir_all(config.upload_dir()).await {
            error!(
                "Cannot create upload directory {}: {e}",
                config.upload_dir().display()
            );
            return Err(rocket);
        }
        debug!("Staging uploads in {}", config.upload_dir().display());

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Settings for the document store.
#[derive(Deserialize)]
struct DbConfig {
    #[serde(default = "default_db_name")]
    db_name: String,
    db_uri: String,
}

fn default_db_name() -> String {
    "would-you-rather".to_string()
}

/// Connect to the document store named by `db_uri`.
pub async fn connect_store(db_uri: &str, db_name: &str) -> Result<Store, mongodb::error::Error> {
    if db_uri == MEMORY_DB_URI {
        warn!("Using the in-memory store; nothing will be persisted");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let client = MongoClient::with_uri_str(db_uri).await?;
    Ok(Arc::new(MongoStore::new(client.database(db_name))))
}

/// A fairing that loads the database config, connects to the database,
/// and places the resulting [`Store`] into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "Document store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let Some(config) = extract::<DbConfig>(&rocket, "database") else {
            return Err(rocket);
        };
        info!("Connecting to the document store...");
        let store = match connect_store(&config.db_uri, &config.db_name).await {
            Ok(store) => store,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        info!("...document store ready");

        rocket = rocket.manage(store);
        Ok(rocket)
    }
}

/// Settings for ID token verification.
#[derive(Deserialize)]
struct IdentityConfig {
    identity_project_id: Option<String>,
    #[serde(default = "default_jwks_url")]
    identity_jwks_url: String,
    identity_secret: Option<String>,
}

fn default_jwks_url() -> String {
    DEFAULT_JWKS_URL.to_string()
}

/// A fairing that loads the identity config and places a [`Verifier`] into
/// managed state.
pub struct IdentityFairing;

#[rocket::async_trait]
impl Fairing for IdentityFairing {
    fn info(&self) -> Info {
        Info {
            name: "Identity verification",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let Some(config) = extract::<IdentityConfig>(&rocket, "identity") else {
            return Err(rocket);
        };
        let project_id = config.identity_project_id.as_deref();
        if project_id.is_none() {
            warn!("No `identity_project_id` set; token audience and issuer will not be checked");
        }

        let verifier: Verifier = match config.identity_secret {
            Some(secret) => {
                warn!("Verifying ID tokens against a shared secret");
                Arc::new(JwtVerifier::with_secret(secret.as_bytes(), project_id))
            }
            None => {
                info!("Verifying ID tokens against {}", config.identity_jwks_url);
                Arc::new(JwtVerifier::with_jwks(config.identity_jwks_url, project_id))
            }
        };

        rocket = rocket.manage(verifier);
        Ok(rocket)
    }
}

/// Settings for the object storage connection.
#[derive(Deserialize)]
struct StorageConfig {
    storage_bucket: String,
    #[serde(default = "default_storage_api_url")]
    storage_api_url: String,
    storage_access_token: Option<String>,
}

fn default_storage_api_url() -> String {
    "https://storage.googleapis.com".to_string()
}

/// A fairing that loads the storage config and places a [`Storage`] into
/// managed state.
pub struct StorageFairing;

#[rocket::async_trait]
impl Fairing for StorageFairing {
    fn info(&self) -> Info {
        Info {
            name: "Object storage",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let Some(config) = extract::<StorageConfig>(&rocket, "object storage") else {
            return Err(rocket);
        };
        let storage: Storage = if config.storage_api_url == MEMORY_STORAGE_URL {
            warn!("Using in-memory object storage; avatar URLs will not resolve");
            Arc::new(MemoryStorage::new(config.storage_bucket))
        } else if let Some(access_token) = config.storage_access_token {
            info!("Loaded object storage config for bucket {}", config.storage_bucket);
            Arc::new(CloudStorage::new(
                config.storage_api_url,
                config.storage_bucket,
                access_token,
            ))
        } else {
            error!("Missing `storage_access_token` for {}", config.storage_api_url);
            return Err(rocket);
        };

        rocket = rocket.manage(storage);
        Ok(rocket)
    }
}

#[cfg(test)]
mod tests {
    use rocket::figment::Figment;

    use super::*;
    use crate::model::store::DocumentStore;

    #[test]
    fn defaults_apply() {
        let config: Config = Figment::new().extract().unwrap();
        assert_eq!(config.upload_dir(), std::env::temp_dir());
        assert_eq!(config.storage_poll_interval(), Duration::from_millis(500));
        assert_eq!(config.storage_poll_attempts(), 20);
    }

    #[test]
    fn overrides_apply() {
        let config: Config = Figment::new()
            .merge(("upload_dir", "/var/tmp/wyr"))
            .merge(("storage_poll_interval_ms", 5))
            .merge(("storage_poll_attempts", 2))
            .extract()
            .unwrap();
        assert_eq!(config.upload_dir(), Path::new("/var/tmp/wyr"));
        assert_eq!(config.storage_poll_interval(), Duration::from_millis(5));
        assert_eq!(config.storage_poll_attempts(), 2);
    }

    #[rocket::async_test]
    async fn memory_uri_selects_memory_store() {
        let store = connect_store(MEMORY_DB_URI, "ignored").await.unwrap();
        assert!(store.list("users").await.unwrap().is_empty());
    }

    #[rocket::async_test]
    async fn memory_services_ignite() {
        let figment = Figment::from(rocket::Config::default())
            .merge(("db_uri", MEMORY_DB_URI))
            .merge(("storage_bucket", "dev-bucket"))
            .merge(("storage_api_url", MEMORY_STORAGE_URL))
            .merge(("identity_secret", "dev-secret"));
        let rocket = rocket::custom(figment)
            .attach(ConfigFairing)
            .attach(DatabaseFairing)
            .attach(IdentityFairing)
            .attach(StorageFairing)
            .ignite()
            .await
            .unwrap();
        assert!(rocket.state::<Config>().is_some());
        assert!(rocket.state::<Store>().is_some());
        assert!(rocket.state::<Verifier>().is_some());
        assert!(rocket.state::<Storage>().is_some());
    }

    #[rocket::async_test]
    async fn missing_storage_config_aborts_ignition() {
        let figment = Figment::from(rocket::Config::default());
        let result = rocket::custom(figment)
            .attach(StorageFairing)
            .ignite()
            .await;
        // Rocket errors must be inspected before they're dropped.
        let err = result.unwrap_err();
        assert!(matches!(
            err.kind(),
            rocket::error::ErrorKind::FailedFairings(_)
        ));
    }
}
