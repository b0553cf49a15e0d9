use super::base::{
    parse_id, CollectionRepository, MutableRepository, Paginated, Pagination, Repository,
    RepositoryError, RepositoryResult, StoredEntity,
};
use super::collection::DocumentCollection;
use super::query::{millis, FindOptions, IndexModel, Query, Sort, SortDirection, Update};
use crate::application::context::RequestContext;
use crate::application::dto::{resolve_sort_field, UserChanges, UserFilter};
use crate::domain::base::now;
use crate::domain::entities::{lock_expiry_for, User};
use crate::domain::value_objects::UserStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub const USER_SORT_FIELDS: &[&str] = &["username", "createdAt", "lastLoginAt"];

impl StoredEntity for User {
    const ENTITY: &'static str = "user";

    fn conflict_field(index: &str) -> &'static str {
        if index.starts_with("email") {
            "email"
        } else {
            "username"
        }
    }
}

/// Users, their profiles and their lockout state
#[derive(Clone)]
pub struct UserRepository {
    inner: CollectionRepository<User>,
}

impl UserRepository {
    pub const COLLECTION: &'static str = "users";

    pub fn new(collection: Arc<dyn DocumentCollection>) -> Self {
        UserRepository {
            inner: CollectionRepository::new(collection),
        }
    }

    pub fn indexes() -> Vec<IndexModel> {
        vec![
            IndexModel::asc("username").unique(),
            IndexModel::asc("email").unique(),
            IndexModel::asc("role").then_asc("status"),
            IndexModel::asc("lockedUntil"),
            IndexModel::desc("createdAt"),
        ]
    }

    pub fn build_query(filter: &UserFilter) -> Query {
        let mut query = Query::new();
        if !filter.role.is_empty() {
            query = query.eq("role", filter.role.as_str());
        }
        if !filter.status.is_empty() {
            query = query.eq("status", filter.status.as_str());
        }
        if !filter.keyword.is_empty() {
            query = query.any_of(
                ["username", "email", "displayName"]
                    .into_iter()
                    .map(|field| Query::new().contains_ignore_case(field, &filter.keyword))
                    .collect(),
            );
        }
        query
    }

    pub fn build_sort(filter: &UserFilter) -> Sort {
        match resolve_sort_field(&filter.sort_by, USER_SORT_FIELDS) {
            Some(field) => Sort::by(field, SortDirection::from_desc(filter.sort_desc)),
            None => Sort::desc("createdAt"),
        }
    }

    pub async fn get_by_username(
        &self,
        ctx: &RequestContext,
        username: &str,
    ) -> RepositoryResult<Option<User>> {
        if username.is_empty() {
            return Err(RepositoryError::Input("username cannot be empty".to_string()));
        }
        self.inner
            .find_one(ctx, &Query::new().eq("username", username))
            .await
    }

    pub async fn get_by_email(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> RepositoryResult<Option<User>> {
        if email.is_empty() {
            return Err(RepositoryError::Input("email cannot be empty".to_string()));
        }
        self.inner.find_one(ctx, &Query::new().eq("email", email)).await
    }

    /// Record a successful login: counter reset, lock cleared, last login stamped
    pub async fn update_login_info(
        &self,
        ctx: &RequestContext,
        id: &str,
        ip_address: &str,
    ) -> RepositoryResult<()> {
        let id = parse_id(id)?;
        let update = Update::new()
            .set("lastLoginAt", millis(now()))
            .set("lastLoginIP", ip_address)
            .set("loginFailCount", 0)
            .unset("lockedUntil");
        self.inner.update_by_id(ctx, id, update).await?;

        let guard = Query::new()
            .eq("_id", id.to_hex())
            .eq("status", UserStatus::Locked.as_str());
        self.inner
            .update_where(ctx, guard, Update::new().set("status", UserStatus::Active.as_str()))
            .await?;
        Ok(())
    }

    /// Count a failed login and lock the account when a threshold is reached.
    ///
    /// The counter is incremented atomically; the lock is written afterwards
    /// from the incremented value. Returns the user as stored after both writes.
    pub async fn increment_login_fail_count(
        &self,
        ctx: &RequestContext,
        id: &str,
    ) -> RepositoryResult<User> {
        let id = parse_id(id)?;
        let mut user = self
            .inner
            .update_and_fetch(ctx, id, Update::new().inc("loginFailCount", 1))
            .await?;

        if let Some(until) = lock_expiry_for(user.login_fail_count, now()) {
            self.lock_user(ctx, &id.to_hex(), until).await?;
            user.lock(until);
            tracing::warn!(
                user_id = %id,
                fail_count = user.login_fail_count,
                locked_until = %until,
                "user locked after repeated login failures"
            );
        }
        Ok(user)
    }

    pub async fn lock_user(
        &self,
        ctx: &RequestContext,
        id: &str,
        until: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let id = parse_id(id)?;
        let update = Update::new()
            .set("status", UserStatus::Locked.as_str())
            .set("lockedUntil", millis(until));
        self.inner.update_by_id(ctx, id, update).await
    }

    /// Administrative unlock
    pub async fn unlock_user(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<()> {
        let id = parse_id(id)?;
        let update = Update::new()
            .set("status", UserStatus::Active.as_str())
            .set("loginFailCount", 0)
            .unset("lockedUntil");
        self.inner.update_by_id(ctx, id, update).await?;
        tracing::info!(user_id = %id, "user unlocked");
        Ok(())
    }

    /// Locked users whose lock has already expired
    pub async fn get_locked_users(&self, ctx: &RequestContext) -> RepositoryResult<Vec<User>> {
        let query = Query::new()
            .eq("status", UserStatus::Locked.as_str())
            .lte("lockedUntil", millis(now()));
        self.inner
            .find_many(ctx, &query, &FindOptions::sorted(Sort::asc("lockedUntil")))
            .await
    }

    pub async fn list_expired_locks(&self, ctx: &RequestContext) -> RepositoryResult<Vec<User>> {
        self.get_locked_users(ctx).await
    }
}

#[async_trait]
impl Repository<User> for UserRepository {
    type Filter = UserFilter;

    async fn create(&self, ctx: &RequestContext, user: &mut User) -> RepositoryResult<()> {
        user.validate_for_create()?;
        user.prepare_for_insert();
        self.inner.insert(ctx, user).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "user created");
        Ok(())
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<Option<User>> {
        self.inner.find_by_id(ctx, id).await
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        filter: &UserFilter,
    ) -> RepositoryResult<Paginated<User>> {
        let pagination = Pagination::new(filter.page, filter.limit);
        self.inner
            .paginate(ctx, &Self::build_query(filter), Self::build_sort(filter), pagination)
            .await
    }

    async fn create_indexes(&self, ctx: &RequestContext) -> RepositoryResult<()> {
        self.inner.create_indexes(ctx, &Self::indexes()).await
    }
}

#[async_trait]
impl MutableRepository<User> for UserRepository {
    type Changes = UserChanges;

    async fn update(
        &self,
        ctx: &RequestContext,
        id: &str,
        changes: &UserChanges,
    ) -> RepositoryResult<()> {
        let id = parse_id(id)?;
        changes.validate()?;
        let update = Update::new()
            .set_some("username", changes.username.clone())
            .set_some("email", changes.email.clone())
            .set_some("passwordHash", changes.password_hash.clone())
            .set_some("displayName", changes.display_name.clone())
            .set_some("role", changes.role.map(|role| role.as_str()))
            .set_some("status", changes.status.map(|status| status.as_str()))
            .set_some("profileImage", changes.profile_image.clone())
            .set_some("coverImage", changes.cover_image.clone())
            .set_some("bio", changes.bio.clone())
            .set_some("location", changes.location.clone())
            .set_some("website", changes.website.clone())
            .set_some("twitter", changes.twitter.clone())
            .set_some("facebook", changes.facebook.clone());
        self.inner.update_by_id(ctx, id, update).await
    }

    /// Deactivate; the document is kept
    async fn delete(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<()> {
        let id = parse_id(id)?;
        let update = Update::new().set("status", UserStatus::Inactive.as_str());
        self.inner.update_by_id(ctx, id, update).await?;
        tracing::info!(user_id = %id, "user deactivated");
        Ok(())
    }
}
