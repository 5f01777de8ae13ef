use mongodb::{
    bson::{doc, Bson, Document},
    error::{Error as DbError, ErrorKind, WriteFailure},
    Collection, Database,
};
use rocket::futures::TryStreamExt;

use super::{DocumentStore, StoreError, Version, Versioned};

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_id(err: &DbError) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref e)) if e.code == DUPLICATE_KEY
    )
}

/// A [`DocumentStore`] backed by MongoDB.
///
/// Each record is stored as `{ _id, version, data }`.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn coll(&self, collection: &str) -> Collection<Document> {
        self.db.collection(collection)
    }
}

/// Split a stored document into its ID and versioned payload.
fn unwrap_document(
    collection: &str,
    mut document: Document,
) -> Result<(String, Versioned<Document>), StoreError> {
    let id = document
        .get_str("_id")
        .map_err(|e| StoreError::malformed(collection, e))?
        .to_string();
    let version = document
        .get_i64("version")
        .map_err(|e| StoreError::malformed(collection, e))?;
    let data = match document.remove("data") {
        Some(Bson::Document(data)) => data,
        _ => return Err(StoreError::malformed(collection, format!("{id} has no data"))),
    };
    Ok((id, Versioned { version, data }))
}

#[rocket::async_trait]
impl DocumentStore for MongoStore {
    async fn create(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError> {
        let document = doc! {
            "_id": id,
            "version": 1_i64,
            "data": data,
        };
        match self.coll(collection).insert_one(document, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_id(&e) => Err(StoreError::already_exists(collection, id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Versioned<Document>>, StoreError> {
        let found = self.coll(collection).find_one(doc! { "_id": id }, None).await?;
        found
            .map(|document| unwrap_document(collection, document).map(|(_, versioned)| versioned))
            .transpose()
    }

    async fn replace(
        &self,
        collection: &str,
        id: &str,
        data: Document,
        expected: Version,
    ) -> Result<Version, StoreError> {
        let filter = doc! {
            "_id": id,
            "version": expected,
        };
        let update = doc! {
            "$set": { "data": data },
            "$inc": { "version": 1_i64 },
        };
        let result = self.coll(collection).update_one(filter, update, None).await?;
        if result.matched_count == 1 {
            return Ok(expected + 1);
        }

        // Nothing matched: either the record is gone or someone got there first.
        let exists = self
            .coll(collection)
            .find_one(doc! { "_id": id }, None)
            .await?
            .is_some();
        if exists {
            Err(StoreError::conflict(collection, id))
        } else {
            Err(StoreError::not_found(collection, id))
        }
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        let documents: Vec<Document> = self
            .coll(collection)
            .find(None, None)
            .await?
            .try_collect()
            .await?;
        documents
            .into_iter()
            .map(|document| {
                unwrap_document(collection, document).map(|(id, versioned)| (id, versioned.data))
            })
            .collect()
    }
}
