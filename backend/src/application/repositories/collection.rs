/// The document collection port consumed by every repository
use super::query::{FindOptions, IndexModel, Query, Update, UpdateResult};
use crate::application::context::RequestContext;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// A stored document: a JSON object keyed by field name, id under `_id`
pub type Document = Map<String, Value>;

#[derive(Error, Debug)]
pub enum CollectionError {
    /// A unique index rejected the write; carries the index name
    #[error("duplicate key on index {index}")]
    DuplicateKey { index: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation deadline exceeded")]
    DeadlineExceeded,

    #[error("failed to encode document: {0}")]
    Encode(String),

    #[error("failed to decode document: {0}")]
    Decode(String),

    #[error("backend error: {0}")]
    Backend(String),
}

pub type CollectionResult<T> = Result<T, CollectionError>;

/// Minimal document collection contract.
///
/// Reads report absence as `Ok(None)`; unique index violations surface as
/// [`CollectionError::DuplicateKey`]. Every call honours the context's
/// cancellation and deadline.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    fn name(&self) -> &str;

    async fn insert_one(&self, ctx: &RequestContext, document: Document) -> CollectionResult<()>;

    async fn find_one(&self, ctx: &RequestContext, query: &Query)
        -> CollectionResult<Option<Document>>;

    async fn find(
        &self,
        ctx: &RequestContext,
        query: &Query,
        options: &FindOptions,
    ) -> CollectionResult<Vec<Document>>;

    async fn count_documents(&self, ctx: &RequestContext, query: &Query) -> CollectionResult<u64>;

    /// Apply `update` to the first matching document
    async fn update_one(
        &self,
        ctx: &RequestContext,
        query: &Query,
        update: &Update,
    ) -> CollectionResult<UpdateResult>;

    /// Apply `update` to the first matching document and return it as it is
    /// after the update
    async fn find_one_and_update(
        &self,
        ctx: &RequestContext,
        query: &Query,
        update: &Update,
    ) -> CollectionResult<Option<Document>>;

    /// Provision `indexes`, returning their names; existing indexes are kept
    async fn create_indexes(
        &self,
        ctx: &RequestContext,
        indexes: &[IndexModel],
    ) -> CollectionResult<Vec<String>>;
}

pub fn to_document<T: Serialize>(value: &T) -> CollectionResult<Document> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CollectionError::Encode(format!(
            "expected an object, got {other}"
        ))),
        Err(e) => Err(CollectionError::Encode(e.to_string())),
    }
}

pub fn from_document<T: DeserializeOwned>(document: Document) -> CollectionResult<T> {
    serde_json::from_value(Value::Object(document)).map_err(|e| CollectionError::Decode(e.to_string()))
}
