/// Shared repository contract and the generic collection-backed helper
use super::collection::{from_document, to_document, CollectionError, DocumentCollection};
use super::query::{millis, FindOptions, IndexModel, Query, Sort, Update};
use crate::application::context::RequestContext;
use crate::domain::base::{now, Entity, ValidationError};
use crate::domain::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::domain::value_objects::{ObjectId, ObjectIdError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Missing or malformed caller input
    #[error("{0}")]
    Input(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A uniqueness rule was violated on the named natural key
    #[error("{field} already exists")]
    Conflict { field: String },

    /// A write matched no document
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error(transparent)]
    Backend(#[from] CollectionError),
}

impl From<ObjectIdError> for RepositoryError {
    fn from(err: ObjectIdError) -> Self {
        RepositoryError::Input(err.to_string())
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// An entity persisted as one document in one collection
pub trait StoredEntity:
    Entity<Id = ObjectId> + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Name used in not-found errors and logs
    const ENTITY: &'static str;

    /// The natural-key field behind a duplicate on `index`
    fn conflict_field(index: &str) -> &'static str;
}

/// Page number and size after clamping: page at least 1, size in
/// `1..=100` with 10 used for anything below 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64) -> Self {
        let page = page.max(1);
        let limit = if limit < 1 {
            DEFAULT_PAGE_SIZE
        } else {
            limit.min(MAX_PAGE_SIZE)
        };
        Pagination { page, limit }
    }

    /// Documents before this page; saturates for absurdly large pages
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit) as u64
    }

    pub fn find_options(&self, sort: Sort) -> FindOptions {
        FindOptions::sorted(sort)
            .with_skip(self.skip())
            .with_limit(self.limit as u64)
    }
}

/// One page of results plus the total matching count
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: i64,
    pub limit: i64,
}

impl<T> Paginated<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }

    pub fn total_pages(&self) -> u64 {
        if self.limit <= 0 {
            return 0;
        }
        self.total.div_ceil(self.limit as u64)
    }
}

/// Operations every entity repository offers.
#[async_trait]
pub trait Repository<T: StoredEntity>: Send + Sync {
    type Filter: Send + Sync;

    /// Validate, stamp timestamps and insert
    async fn create(&self, ctx: &RequestContext, entity: &mut T) -> RepositoryResult<()>;

    /// `Ok(None)` when no document has this id
    async fn get_by_id(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<Option<T>>;

    /// Filtered, sorted, paginated listing
    async fn list(&self, ctx: &RequestContext, filter: &Self::Filter)
        -> RepositoryResult<Paginated<T>>;

    async fn create_indexes(&self, ctx: &RequestContext) -> RepositoryResult<()>;
}

/// Repositories whose documents change after insert.
#[async_trait]
pub trait MutableRepository<T: StoredEntity>: Repository<T> {
    type Changes: Send + Sync;

    /// Apply a validated patch; `updatedAt` is always stamped
    async fn update(
        &self,
        ctx: &RequestContext,
        id: &str,
        changes: &Self::Changes,
    ) -> RepositoryResult<()>;

    /// Soft delete through the entity's archive status
    async fn delete(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<()>;
}

/// Generic CRUD over a [`DocumentCollection`], composed into each repository
pub struct CollectionRepository<T> {
    collection: Arc<dyn DocumentCollection>,
    entity: PhantomData<fn() -> T>,
}

impl<T> Clone for CollectionRepository<T> {
    fn clone(&self) -> Self {
        CollectionRepository {
            collection: Arc::clone(&self.collection),
            entity: PhantomData,
        }
    }
}

/// Parse a caller-supplied id: empty and malformed ids are input errors
pub fn parse_id(id: &str) -> RepositoryResult<ObjectId> {
    Ok(ObjectId::parse_str(id)?)
}

pub fn id_query(id: ObjectId) -> Query {
    Query::new().eq("_id", id.to_hex())
}

impl<T: StoredEntity> CollectionRepository<T> {
    pub fn new(collection: Arc<dyn DocumentCollection>) -> Self {
        CollectionRepository {
            collection,
            entity: PhantomData,
        }
    }

    pub fn collection(&self) -> &Arc<dyn DocumentCollection> {
        &self.collection
    }

    fn map_write_error(err: CollectionError) -> RepositoryError {
        match err {
            CollectionError::DuplicateKey { index } => RepositoryError::Conflict {
                field: T::conflict_field(&index).to_string(),
            },
            other => RepositoryError::Backend(other),
        }
    }

    pub async fn insert(&self, ctx: &RequestContext, entity: &T) -> RepositoryResult<()> {
        let document = to_document(entity)?;
        self.collection
            .insert_one(ctx, document)
            .await
            .map_err(Self::map_write_error)
    }

    pub async fn find_by_id(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<Option<T>> {
        let id = parse_id(id)?;
        self.find_one(ctx, &id_query(id)).await
    }

    pub async fn find_one(&self, ctx: &RequestContext, query: &Query) -> RepositoryResult<Option<T>> {
        match self.collection.find_one(ctx, query).await? {
            Some(document) => Ok(Some(from_document(document)?)),
            None => Ok(None),
        }
    }

    pub async fn find_many(
        &self,
        ctx: &RequestContext,
        query: &Query,
        options: &FindOptions,
    ) -> RepositoryResult<Vec<T>> {
        let documents = self.collection.find(ctx, query, options).await?;
        documents
            .into_iter()
            .map(|document| from_document(document).map_err(RepositoryError::from))
            .collect()
    }

    pub async fn count(&self, ctx: &RequestContext, query: &Query) -> RepositoryResult<u64> {
        Ok(self.collection.count_documents(ctx, query).await?)
    }

    /// Count then fetch one page
    pub async fn paginate(
        &self,
        ctx: &RequestContext,
        query: &Query,
        sort: Sort,
        pagination: Pagination,
    ) -> RepositoryResult<Paginated<T>> {
        let total = self.count(ctx, query).await?;
        let items = self
            .find_many(ctx, query, &pagination.find_options(sort))
            .await?;
        Ok(Paginated {
            items,
            total,
            page: pagination.page,
            limit: pagination.limit,
        })
    }

    /// Apply `update` to the document with `id`, stamping `updatedAt`.
    ///
    /// Empty updates are refused; zero matches is [`RepositoryError::NotFound`].
    pub async fn update_by_id(
        &self,
        ctx: &RequestContext,
        id: ObjectId,
        update: Update,
    ) -> RepositoryResult<()> {
        if update.is_empty() {
            return Err(RepositoryError::Input("updates cannot be empty".to_string()));
        }
        let update = update.set("updatedAt", millis(now()));
        let result = self
            .collection
            .update_one(ctx, &id_query(id), &update)
            .await
            .map_err(Self::map_write_error)?;
        if result.matched == 0 {
            return Err(RepositoryError::NotFound { entity: T::ENTITY });
        }
        Ok(())
    }

    /// Like [`update_by_id`](Self::update_by_id) but returns the updated entity
    pub async fn update_and_fetch(
        &self,
        ctx: &RequestContext,
        id: ObjectId,
        update: Update,
    ) -> RepositoryResult<T> {
        if update.is_empty() {
            return Err(RepositoryError::Input("updates cannot be empty".to_string()));
        }
        let update = update.set("updatedAt", millis(now()));
        let document = self
            .collection
            .find_one_and_update(ctx, &id_query(id), &update)
            .await
            .map_err(Self::map_write_error)?
            .ok_or(RepositoryError::NotFound { entity: T::ENTITY })?;
        Ok(from_document(document)?)
    }

    /// Conditional update that only applies while `guard` also matches;
    /// returns whether a document matched
    pub async fn update_where(
        &self,
        ctx: &RequestContext,
        guard: Query,
        update: Update,
    ) -> RepositoryResult<bool> {
        let update = update.set("updatedAt", millis(now()));
        let result = self
            .collection
            .update_one(ctx, &guard, &update)
            .await
            .map_err(Self::map_write_error)?;
        Ok(result.matched > 0)
    }

    pub async fn create_indexes(
        &self,
        ctx: &RequestContext,
        indexes: &[IndexModel],
    ) -> RepositoryResult<()> {
        let names = self.collection.create_indexes(ctx, indexes).await?;
        tracing::info!(
            collection = self.collection.name(),
            count = names.len(),
            "indexes provisioned"
        );
        Ok(())
    }
}
