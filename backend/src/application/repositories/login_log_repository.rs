use super::base::{
    parse_id, CollectionRepository, Paginated, Pagination, Repository, RepositoryError,
    RepositoryResult, StoredEntity,
};
use super::collection::DocumentCollection;
use super::publishing::clamp_limit;
use super::query::{millis, FindOptions, IndexModel, Query, Sort, SortDirection};
use crate::application::context::RequestContext;
use crate::application::dto::{resolve_sort_field, LoginLogFilter};
use crate::domain::constants::{DEFAULT_FAILED_LOGIN_LIMIT, MAX_FAILED_LOGIN_LIMIT};
use crate::domain::entities::LoginLog;
use crate::domain::value_objects::{LoginStatus, ObjectId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub const LOGIN_LOG_SORT_FIELDS: &[&str] = &["loginAt", "username", "ipAddress", "status"];

impl StoredEntity for LoginLog {
    const ENTITY: &'static str = "login log";

    fn conflict_field(_index: &str) -> &'static str {
        "id"
    }
}

/// Insert-only audit trail of login attempts
#[derive(Clone)]
pub struct LoginLogRepository {
    inner: CollectionRepository<LoginLog>,
}

impl LoginLogRepository {
    pub const COLLECTION: &'static str = "loginLogs";

    pub fn new(collection: Arc<dyn DocumentCollection>) -> Self {
        LoginLogRepository {
            inner: CollectionRepository::new(collection),
        }
    }

    pub fn indexes() -> Vec<IndexModel> {
        vec![
            IndexModel::asc("userId").then_desc("loginAt"),
            IndexModel::asc("ipAddress").then_desc("loginAt"),
            IndexModel::asc("status").then_desc("loginAt"),
            IndexModel::desc("loginAt"),
            IndexModel::asc("username"),
        ]
    }

    pub fn build_query(filter: &LoginLogFilter) -> Query {
        let mut query = Query::new();
        if let Ok(user_id) = ObjectId::parse_str(&filter.user_id) {
            query = query.eq("userId", user_id.to_hex());
        }
        if !filter.username.is_empty() {
            query = query.contains_ignore_case("username", &filter.username);
        }
        for (field, value) in [
            ("status", &filter.status),
            ("ipAddress", &filter.ip_address),
            ("country", &filter.country),
            ("region", &filter.region),
            ("city", &filter.city),
            ("deviceType", &filter.device_type),
            ("browser", &filter.browser),
            ("os", &filter.os),
        ] {
            if !value.is_empty() {
                query = query.eq(field, value.as_str());
            }
        }
        if let Some(start) = filter.start_time {
            query = query.gte("loginAt", millis(start));
        }
        if let Some(end) = filter.end_time {
            query = query.lte("loginAt", millis(end));
        }
        query
    }

    pub fn build_sort(filter: &LoginLogFilter) -> Sort {
        match resolve_sort_field(&filter.sort_by, LOGIN_LOG_SORT_FIELDS) {
            Some(field) => Sort::by(field, SortDirection::from_desc(filter.sort_desc)),
            None => Sort::desc("loginAt"),
        }
    }

    /// Logs of one user, newest first. Unlike list filters, a malformed id is an error.
    pub async fn get_by_user_id(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        page: i64,
        limit: i64,
    ) -> RepositoryResult<Paginated<LoginLog>> {
        let user_id = parse_id(user_id)?;
        let query = Query::new().eq("userId", user_id.to_hex());
        self.inner
            .paginate(ctx, &query, Sort::desc("loginAt"), Pagination::new(page, limit))
            .await
    }

    pub async fn get_by_ip_address(
        &self,
        ctx: &RequestContext,
        ip_address: &str,
        page: i64,
        limit: i64,
    ) -> RepositoryResult<Paginated<LoginLog>> {
        if ip_address.is_empty() {
            return Err(RepositoryError::Input("ip address cannot be empty".to_string()));
        }
        let query = Query::new().eq("ipAddress", ip_address);
        self.inner
            .paginate(ctx, &query, Sort::desc("loginAt"), Pagination::new(page, limit))
            .await
    }

    /// Failed attempts at or after `since`, newest first
    pub async fn get_recent_failed_logins(
        &self,
        ctx: &RequestContext,
        since: DateTime<Utc>,
        limit: i64,
    ) -> RepositoryResult<Vec<LoginLog>> {
        let limit = clamp_limit(limit, DEFAULT_FAILED_LOGIN_LIMIT, MAX_FAILED_LOGIN_LIMIT);
        let query = Query::new()
            .eq("status", LoginStatus::Failed.as_str())
            .gte("loginAt", millis(since));
        let options = FindOptions::sorted(Sort::desc("loginAt")).with_limit(limit as u64);
        self.inner.find_many(ctx, &query, &options).await
    }
}

#[async_trait]
impl Repository<LoginLog> for LoginLogRepository {
    type Filter = LoginLogFilter;

    async fn create(&self, ctx: &RequestContext, log: &mut LoginLog) -> RepositoryResult<()> {
        log.validate_for_create()?;
        log.prepare_for_insert();
        self.inner.insert(ctx, log).await?;
        tracing::debug!(
            log_id = %log.id,
            username = %log.username,
            status = %log.status,
            "login attempt recorded"
        );
        Ok(())
    }

    async fn get_by_id(
        &self,
        ctx: &RequestContext,
        id: &str,
    ) -> RepositoryResult<Option<LoginLog>> {
        self.inner.find_by_id(ctx, id).await
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        filter: &LoginLogFilter,
    ) -> RepositoryResult<Paginated<LoginLog>> {
        let pagination = Pagination::new(filter.page, filter.limit);
        self.inner
            .paginate(ctx, &Self::build_query(filter), Self::build_sort(filter), pagination)
            .await
    }

    async fn create_indexes(&self, ctx: &RequestContext) -> RepositoryResult<()> {
        self.inner.create_indexes(ctx, &Self::indexes()).await
    }
}
