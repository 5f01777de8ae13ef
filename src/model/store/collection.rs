use std::collections::HashMap;
use std::marker::PhantomData;

use mongodb::bson;
use rocket::{
    http::Status,
    outcome::IntoOutcome,
    request::{self, FromRequest, Request},
};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};

use super::{Store, StoreError, Version, Versioned};

/// How many times [`Coll::modify`] re-reads and retries after losing a
/// conditional write.
pub const MAX_WRITE_ATTEMPTS: usize = 5;

/// A type that can be directly inserted/read to/from the document store.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// The name of the collection.
    const COLLECTION: &'static str;

    /// The record's unique ID within its collection.
    fn id(&self) -> &str;
}

/// A typed handle on one collection of the document store.
pub struct Coll<T> {
    store: Store,
    phantom: PhantomData<fn() -> T>,
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            phantom: PhantomData,
        }
    }
}

impl<T> Coll<T>
where
    T: Record,
{
    /// Get a handle on this collection in the given store.
    pub fn new(store: Store) -> Self {
        Self {
            store,
            phantom: PhantomData,
        }
    }

    /// Insert a new record, failing if one with the same ID already exists.
    pub async fn create(&self, record: &T) -> Result<()> {
        let data = bson::to_document(record)?;
        self.store.create(T::COLLECTION, record.id(), data).await?;
        Ok(())
    }

    /// Fetch a record by ID, if it exists.
    pub async fn get(&self, id: &str) -> Result<Option<Versioned<T>>> {
        match self.store.get(T::COLLECTION, id).await? {
            Some(Versioned { version, data }) => Ok(Some(Versioned {
                version,
                data: bson::from_document(data)?,
            })),
            None => Ok(None),
        }
    }

    /// Fetch a record by ID, treating absence as an error.
    pub async fn find(&self, id: &str) -> Result<Versioned<T>> {
        self.get(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("{} with ID '{}'", T::COLLECTION, id)))
    }

    /// Write back a record read earlier. Fails with
    /// [`StoreError::ConcurrentModification`] if it changed in the meantime.
    pub async fn replace(&self, record: &Versioned<T>) -> Result<Version> {
        let data = bson::to_document(&record.data)?;
        let version = self
            .store
            .replace(T::COLLECTION, record.data.id(), data, record.version)
            .await?;
        Ok(version)
    }

    /// Read-modify-write the record with the given ID, retrying from a fresh
    /// read whenever another writer got in first.
    ///
    /// The update closure may run several times and must not have side effects
    /// beyond the record itself. Returns the record as written.
    pub async fn modify<F>(&self, id: &str, mut update: F) -> Result<T>
    where
        F: FnMut(&mut T) -> Result<()> + Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut record = self.find(id).await?;
            update(&mut record.data)?;
            match self.replace(&record).await {
                Ok(_) => return Ok(record.data),
                Err(Error::Store(StoreError::ConcurrentModification { .. }))
                    if attempt < MAX_WRITE_ATTEMPTS =>
                {
                    debug!(
                        "Write conflict on {}/{} (attempt {attempt}), retrying",
                        T::COLLECTION,
                        id
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Every record in the collection, keyed by ID.
    pub async fn all(&self) -> Result<HashMap<String, T>> {
        self.store
            .list(T::COLLECTION)
            .await?
            .into_iter()
            .map(|(id, data)| -> Result<(String, T)> { Ok((id, bson::from_document(data)?)) })
            .collect()
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: Record,
{
    type Error = ();

    /// Get the store from the managed state and wrap it in a collection.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        req.rocket()
            .state::<Store>()
            .map(|store| Coll::new(store.clone()))
            .into_outcome((Status::InternalServerError, ()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use mongodb::bson::Document;
    use serde::Deserialize;

    use super::*;
    use crate::model::store::{DocumentStore, MemoryStore};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Counter {
        id: String,
        count: u32,
    }

    impl Record for Counter {
        const COLLECTION: &'static str = "counters";

        fn id(&self) -> &str {
            &self.id
        }
    }

    fn counter(count: u32) -> Counter {
        Counter {
            id: "c".to_string(),
            count,
        }
    }

    #[rocket::async_test]
    async fn find_missing_is_not_found() {
        let counters = Coll::<Counter>::new(Arc::new(MemoryStore::new()));
        assert!(counters.get("c").await.unwrap().is_none());
        assert!(matches!(counters.find("c").await, Err(Error::NotFound(_))));
    }

    #[rocket::async_test]
    async fn stale_replace_is_rejected() {
        let counters = Coll::<Counter>::new(Arc::new(MemoryStore::new()));
        counters.create(&counter(0)).await.unwrap();

        let mut first = counters.find("c").await.unwrap();
        let mut second = counters.find("c").await.unwrap();
        first.data.count = 1;
        second.data.count = 2;

        assert_eq!(counters.replace(&first).await.unwrap(), 2);
        assert!(matches!(
            counters.replace(&second).await,
            Err(Error::Store(StoreError::ConcurrentModification { .. }))
        ));
        assert_eq!(counters.find("c").await.unwrap().data, counter(1));
    }

    /// A store that lets another writer win the first conditional write.
    struct ConflictOnce {
        inner: MemoryStore,
        raced: AtomicBool,
    }

    #[rocket::async_trait]
    impl DocumentStore for ConflictOnce {
        async fn create(
            &self,
            collection: &str,
            id: &str,
            data: Document,
        ) -> std::result::Result<(), StoreError> {
            self.inner.create(collection, id, data).await
        }

        async fn get(
            &self,
            collection: &str,
            id: &str,
        ) -> std::result::Result<Option<Versioned<Document>>, StoreError> {
            self.inner.get(collection, id).await
        }

        async fn replace(
            &self,
            collection: &str,
            id: &str,
            data: Document,
            expected: Version,
        ) -> std::result::Result<Version, StoreError> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let theirs = bson::to_document(&counter(10)).unwrap();
                self.inner.replace(collection, id, theirs, expected).await?;
            }
            self.inner.replace(collection, id, data, expected).await
        }

        async fn list(
            &self,
            collection: &str,
        ) -> std::result::Result<Vec<(String, Document)>, StoreError> {
            self.inner.list(collection).await
        }
    }

    #[rocket::async_test]
    async fn modify_retries_after_conflict() {
        let store = ConflictOnce {
            inner: MemoryStore::new(),
            raced: AtomicBool::new(false),
        };
        let counters = Coll::<Counter>::new(Arc::new(store));
        counters.create(&counter(0)).await.unwrap();

        let mut calls = 0;
        let written = counters
            .modify("c", |c| {
                calls += 1;
                c.count += 1;
                Ok(())
            })
            .await
            .unwrap();

        // The first attempt lost to the competing write of 10.
        assert_eq!(calls, 2);
        assert_eq!(written, counter(11));
        assert_eq!(counters.find("c").await.unwrap().version, 3);
    }

    #[rocket::async_test]
    async fn modify_gives_up_eventually() {
        struct AlwaysConflict;

        #[rocket::async_trait]
        impl DocumentStore for AlwaysConflict {
            async fn create(&self, _: &str, _: &str, _: Document) -> std::result::Result<(), StoreError> {
                Ok(())
            }

            async fn get(
                &self,
                _: &str,
                _: &str,
            ) -> std::result::Result<Option<Versioned<Document>>, StoreError> {
                Ok(Some(Versioned {
                    version: 1,
                    data: bson::to_document(&counter(0)).unwrap(),
                }))
            }

            async fn replace(
                &self,
                collection: &str,
                id: &str,
                _: Document,
                _: Version,
            ) -> std::result::Result<Version, StoreError> {
                Err(StoreError::conflict(collection, id))
            }

            async fn list(&self, _: &str) -> std::result::Result<Vec<(String, Document)>, StoreError> {
                Ok(Vec::new())
            }
        }

        let counters = Coll::<Counter>::new(Arc::new(AlwaysConflict));
        let mut calls = 0;
        let result = counters
            .modify("c", |_| {
                calls += 1;
                Ok(())
            })
            .await;

        assert_eq!(calls, MAX_WRITE_ATTEMPTS);
        assert!(matches!(
            result,
            Err(Error::Store(StoreError::ConcurrentModification { .. }))
        ));
    }

    #[rocket::async_test]
    async fn all_decodes_every_record() {
        let counters = Coll::<Counter>::new(Arc::new(MemoryStore::new()));
        counters.create(&counter(4)).await.unwrap();
        counters
            .create(&Counter {
                id: "d".to_string(),
                count: 7,
            })
            .await
            .unwrap();

        let all = counters.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["c"], counter(4));
        assert_eq!(all["d"].count, 7);
    }
}
