use super::base::{
    parse_id, CollectionRepository, MutableRepository, Paginated, Pagination, Repository,
    RepositoryError, RepositoryResult, StoredEntity,
};
use super::collection::{CollectionError, DocumentCollection};
use super::publishing::{self, apply_schedule, clamp_limit, due_for_publish};
use super::query::{millis, FindOptions, IndexModel, Query, Sort, SortDirection, Update};
use crate::application::context::RequestContext;
use crate::application::dto::post::to_tags;
use crate::application::dto::{resolve_sort_field, PostChanges, PostFilter};
use crate::domain::base::now;
use crate::domain::constants::*;
use crate::domain::content::markdown_word_count;
use crate::domain::entities::Post;
use crate::domain::value_objects::{ObjectId, PostStatus, PostVisibility};
use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;

pub const POST_SORT_FIELDS: &[&str] = &["title", "createdAt", "updatedAt", "publishedAt", "viewCount"];

impl StoredEntity for Post {
    const ENTITY: &'static str = "post";

    fn conflict_field(_index: &str) -> &'static str {
        "slug"
    }
}

#[derive(Clone)]
pub struct PostRepository {
    inner: CollectionRepository<Post>,
}

impl PostRepository {
    pub const COLLECTION: &'static str = "posts";

    pub fn new(collection: Arc<dyn DocumentCollection>) -> Self {
        PostRepository {
            inner: CollectionRepository::new(collection),
        }
    }

    pub fn indexes() -> Vec<IndexModel> {
        vec![
            IndexModel::asc("slug").unique(),
            IndexModel::asc("status").then_asc("visibility"),
            IndexModel::asc("authorId").then_asc("status"),
            IndexModel::asc("tags.slug").then_asc("status"),
            IndexModel::asc("type"),
            IndexModel::desc("publishedAt"),
            IndexModel::desc("createdAt"),
            IndexModel::desc("updatedAt"),
            IndexModel::desc("viewCount"),
            IndexModel::asc("status").then_asc("publishedAt"),
            IndexModel::text(&["title", "excerpt", "markdown"]),
        ]
    }

    /// Translate a filter into a query. Empty fields are skipped and an
    /// unparsable author id is dropped rather than reported.
    pub fn build_query(filter: &PostFilter) -> Query {
        let mut query = Query::new();
        for (field, value) in [
            ("status", &filter.status),
            ("type", &filter.post_type),
            ("visibility", &filter.visibility),
        ] {
            if !value.is_empty() {
                query = query.eq(field, value.as_str());
            }
        }
        if let Ok(author_id) = ObjectId::parse_str(&filter.author_id) {
            query = query.eq("authorId", author_id.to_hex());
        }
        if !filter.tag.is_empty() {
            query = query.eq("tags.slug", filter.tag.as_str());
        }
        if !filter.keyword.is_empty() {
            query = query.any_of(
                ["title", "excerpt", "markdown"]
                    .into_iter()
                    .map(|field| Query::new().contains_ignore_case(field, &filter.keyword))
                    .collect(),
            );
        }
        query
    }

    pub fn build_sort(filter: &PostFilter) -> Sort {
        match resolve_sort_field(&filter.sort_by, POST_SORT_FIELDS) {
            Some(field) => Sort::by(field, SortDirection::from_desc(filter.sort_desc)),
            None => Sort::desc("createdAt"),
        }
    }

    fn changes_to_update(changes: &PostChanges) -> RepositoryResult<(Update, bool)> {
        let mut update = Update::new()
            .set_some("title", changes.title.clone())
            .set_some("slug", changes.slug.clone())
            .set_some("excerpt", changes.excerpt.clone())
            .set_some("html", changes.html.clone())
            .set_some("featuredImage", changes.featured_image.clone())
            .set_some("type", changes.post_type.map(|t| t.as_str()))
            .set_some("visibility", changes.visibility.map(|v| v.as_str()))
            .set_some("metaTitle", changes.meta_title.clone())
            .set_some("metaDescription", changes.meta_description.clone())
            .set_some("canonicalUrl", changes.canonical_url.clone())
            .set_some("publishedAt", changes.published_at.map(millis));

        if let Some(markdown) = &changes.markdown {
            let words = markdown_word_count(markdown);
            update = update
                .set("markdown", markdown.as_str())
                .set("wordCount", words)
                .set("readingTime", calculate_reading_time(words));
        }
        if let Some(tags) = &changes.tags {
            let tags = serde_json::to_value(to_tags(tags))
                .map_err(|e| CollectionError::Encode(e.to_string()))?;
            update = update.set("tags", tags);
        }
        Ok(apply_schedule(update, changes.status, changes.published_at))
    }

    pub async fn get_by_slug(
        &self,
        ctx: &RequestContext,
        slug: &str,
    ) -> RepositoryResult<Option<Post>> {
        if slug.is_empty() {
            return Err(RepositoryError::Input("slug cannot be empty".to_string()));
        }
        self.inner.find_one(ctx, &Query::new().eq("slug", slug)).await
    }

    /// Listing restricted to published, public posts
    pub async fn get_published_list(
        &self,
        ctx: &RequestContext,
        filter: &PostFilter,
    ) -> RepositoryResult<Paginated<Post>> {
        let filter = PostFilter {
            status: PostStatus::Published.as_str().to_string(),
            visibility: PostVisibility::Public.as_str().to_string(),
            ..filter.clone()
        };
        self.list(ctx, &filter).await
    }

    pub async fn get_by_author(
        &self,
        ctx: &RequestContext,
        author_id: &str,
        filter: &PostFilter,
    ) -> RepositoryResult<Paginated<Post>> {
        if author_id.is_empty() {
            return Err(RepositoryError::Input("author id cannot be empty".to_string()));
        }
        let author_id = parse_id(author_id)?;
        let filter = PostFilter {
            author_id: author_id.to_hex(),
            ..filter.clone()
        };
        self.list(ctx, &filter).await
    }

    pub async fn get_by_tag(
        &self,
        ctx: &RequestContext,
        tag_slug: &str,
        filter: &PostFilter,
    ) -> RepositoryResult<Paginated<Post>> {
        if tag_slug.is_empty() {
            return Err(RepositoryError::Input("tag cannot be empty".to_string()));
        }
        let filter = PostFilter {
            tag: tag_slug.to_string(),
            ..filter.clone()
        };
        self.list(ctx, &filter).await
    }

    /// Scheduled posts that are due now, oldest first
    pub async fn get_scheduled_posts(&self, ctx: &RequestContext) -> RepositoryResult<Vec<Post>> {
        self.inner
            .find_many(
                ctx,
                &due_for_publish(now()),
                &FindOptions::sorted(Sort::asc("publishedAt")),
            )
            .await
    }

    /// Most viewed published public posts of the last `days` days
    pub async fn get_popular_posts(
        &self,
        ctx: &RequestContext,
        limit: i64,
        days: i64,
    ) -> RepositoryResult<Vec<Post>> {
        let limit = clamp_limit(limit, DEFAULT_POPULAR_LIMIT, MAX_PAGE_SIZE);
        let days = if days < 1 { DEFAULT_POPULAR_DAYS } else { days };
        let query = Query::new()
            .eq("status", PostStatus::Published.as_str())
            .eq("visibility", PostVisibility::Public.as_str())
            .gte("publishedAt", millis(now() - Duration::days(days)));
        let sort = Sort::desc("viewCount").then("publishedAt", SortDirection::Descending);
        self.inner
            .find_many(ctx, &query, &FindOptions::sorted(sort).with_limit(limit as u64))
            .await
    }

    pub async fn get_recent_posts(
        &self,
        ctx: &RequestContext,
        limit: i64,
    ) -> RepositoryResult<Vec<Post>> {
        let limit = clamp_limit(limit, DEFAULT_RECENT_LIMIT, MAX_PAGE_SIZE);
        let query = Query::new()
            .eq("status", PostStatus::Published.as_str())
            .eq("visibility", PostVisibility::Public.as_str());
        let options = FindOptions::sorted(Sort::desc("publishedAt")).with_limit(limit as u64);
        self.inner.find_many(ctx, &query, &options).await
    }

    /// Atomic `+1`
    pub async fn increment_view_count(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<()> {
        let id = parse_id(id)?;
        self.inner
            .update_by_id(ctx, id, Update::new().inc("viewCount", 1))
            .await
    }

    pub async fn publish(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<()> {
        let id = parse_id(id)?;
        publishing::publish(&self.inner, ctx, id).await?;
        tracing::info!(post_id = %id, "post published");
        Ok(())
    }

    pub async fn unpublish(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<()> {
        let id = parse_id(id)?;
        publishing::unpublish(&self.inner, ctx, id).await
    }
}

#[async_trait]
impl Repository<Post> for PostRepository {
    type Filter = PostFilter;

    async fn create(&self, ctx: &RequestContext, post: &mut Post) -> RepositoryResult<()> {
        post.ensure_tag_slugs();
        post.validate_for_create()?;
        post.prepare_for_insert();
        self.inner.insert(ctx, post).await?;
        tracing::info!(post_id = %post.id, slug = %post.slug, "post created");
        Ok(())
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<Option<Post>> {
        self.inner.find_by_id(ctx, id).await
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        filter: &PostFilter,
    ) -> RepositoryResult<Paginated<Post>> {
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
impl MutableRepository<Post> for PostRepository {
    type Changes = PostChanges;

    async fn update(
        &self,
        ctx: &RequestContext,
        id: &str,
        changes: &PostChanges,
    ) -> RepositoryResult<()> {
        let id = parse_id(id)?;
        changes.validate()?;
        let (update, schedule_pending) = Self::changes_to_update(changes)?;
        self.inner.update_by_id(ctx, id, update).await?;
        if schedule_pending && publishing::schedule_if_draft(&self.inner, ctx, id).await? {
            tracing::debug!(post_id = %id, "draft post scheduled");
        }
        Ok(())
    }

    /// Archive; the document is kept
    async fn delete(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<()> {
        let id = parse_id(id)?;
        publishing::archive(&self.inner, ctx, id).await?;
        tracing::info!(post_id = %id, "post archived");
        Ok(())
    }
}
