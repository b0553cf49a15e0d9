use super::base::{
    parse_id, CollectionRepository, MutableRepository, Paginated, Pagination, Repository,
    RepositoryError, RepositoryResult, StoredEntity,
};
use super::collection::DocumentCollection;
use super::publishing::{self, apply_schedule, clamp_limit, due_for_publish};
use super::query::{millis, FindOptions, IndexModel, Query, Sort, SortDirection, Update};
use crate::application::context::RequestContext;
use crate::application::dto::{resolve_sort_field, PageChanges, PageFilter};
use crate::domain::base::now;
use crate::domain::constants::{DEFAULT_RECENT_LIMIT, MAX_PAGE_SIZE};
use crate::domain::entities::Page;
use crate::domain::value_objects::{ObjectId, PostStatus};
use async_trait::async_trait;
use std::sync::Arc;

pub const PAGE_SORT_FIELDS: &[&str] = &["title", "createdAt", "updatedAt", "publishedAt"];

impl StoredEntity for Page {
    const ENTITY: &'static str = "page";

    fn conflict_field(_index: &str) -> &'static str {
        "slug"
    }
}

/// Standalone pages (about, contact, landing pages)
#[derive(Clone)]
pub struct PageRepository {
    inner: CollectionRepository<Page>,
}

impl PageRepository {
    pub const COLLECTION: &'static str = "pages";

    pub fn new(collection: Arc<dyn DocumentCollection>) -> Self {
        PageRepository {
            inner: CollectionRepository::new(collection),
        }
    }

    pub fn indexes() -> Vec<IndexModel> {
        vec![
            IndexModel::asc("slug").unique(),
            IndexModel::asc("status"),
            IndexModel::asc("authorId").then_asc("status"),
            IndexModel::asc("template").then_asc("status"),
            IndexModel::desc("publishedAt"),
            IndexModel::desc("createdAt"),
            IndexModel::desc("updatedAt"),
            IndexModel::asc("status").then_asc("publishedAt"),
            IndexModel::text(&["title", "content"]),
        ]
    }

    pub fn build_query(filter: &PageFilter) -> Query {
        let mut query = Query::new();
        if !filter.status.is_empty() {
            query = query.eq("status", filter.status.as_str());
        }
        if !filter.template.is_empty() {
            query = query.eq("template", filter.template.as_str());
        }
        if let Ok(author_id) = ObjectId::parse_str(&filter.author_id) {
            query = query.eq("authorId", author_id.to_hex());
        }
        if !filter.keyword.is_empty() {
            query = query.any_of(vec![
                Query::new().contains_ignore_case("title", &filter.keyword),
                Query::new().contains_ignore_case("content", &filter.keyword),
            ]);
        }
        query
    }

    pub fn build_sort(filter: &PageFilter) -> Sort {
        match resolve_sort_field(&filter.sort_by, PAGE_SORT_FIELDS) {
            Some(field) => Sort::by(field, SortDirection::from_desc(filter.sort_desc)),
            None => Sort::desc("createdAt"),
        }
    }

    pub async fn get_by_slug(
        &self,
        ctx: &RequestContext,
        slug: &str,
    ) -> RepositoryResult<Option<Page>> {
        if slug.is_empty() {
            return Err(RepositoryError::Input("slug cannot be empty".to_string()));
        }
        self.inner.find_one(ctx, &Query::new().eq("slug", slug)).await
    }

    pub async fn get_published_list(
        &self,
        ctx: &RequestContext,
        filter: &PageFilter,
    ) -> RepositoryResult<Paginated<Page>> {
        let filter = PageFilter {
            status: PostStatus::Published.as_str().to_string(),
            ..filter.clone()
        };
        self.list(ctx, &filter).await
    }

    pub async fn get_by_author(
        &self,
        ctx: &RequestContext,
        author_id: &str,
        filter: &PageFilter,
    ) -> RepositoryResult<Paginated<Page>> {
        if author_id.is_empty() {
            return Err(RepositoryError::Input("author id cannot be empty".to_string()));
        }
        let author_id = parse_id(author_id)?;
        let filter = PageFilter {
            author_id: author_id.to_hex(),
            ..filter.clone()
        };
        self.list(ctx, &filter).await
    }

    pub async fn get_by_template(
        &self,
        ctx: &RequestContext,
        template: &str,
        filter: &PageFilter,
    ) -> RepositoryResult<Paginated<Page>> {
        if template.is_empty() {
            return Err(RepositoryError::Input("template cannot be empty".to_string()));
        }
        let filter = PageFilter {
            template: template.to_string(),
            ..filter.clone()
        };
        self.list(ctx, &filter).await
    }

    pub async fn get_scheduled_pages(&self, ctx: &RequestContext) -> RepositoryResult<Vec<Page>> {
        self.inner
            .find_many(
                ctx,
                &due_for_publish(now()),
                &FindOptions::sorted(Sort::asc("publishedAt")),
            )
            .await
    }

    pub async fn get_recent_pages(
        &self,
        ctx: &RequestContext,
        limit: i64,
    ) -> RepositoryResult<Vec<Page>> {
        let limit = clamp_limit(limit, DEFAULT_RECENT_LIMIT, MAX_PAGE_SIZE);
        let query = Query::new().eq("status", PostStatus::Published.as_str());
        let options = FindOptions::sorted(Sort::desc("publishedAt")).with_limit(limit as u64);
        self.inner.find_many(ctx, &query, &options).await
    }

    pub async fn publish(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<()> {
        let id = parse_id(id)?;
        publishing::publish(&self.inner, ctx, id).await?;
        tracing::info!(page_id = %id, "page published");
        Ok(())
    }

    pub async fn unpublish(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<()> {
        let id = parse_id(id)?;
        publishing::unpublish(&self.inner, ctx, id).await
    }
}

#[async_trait]
impl Repository<Page> for PageRepository {
    type Filter = PageFilter;

    async fn create(&self, ctx: &RequestContext, page: &mut Page) -> RepositoryResult<()> {
        page.validate_for_create()?;
        page.prepare_for_insert();
        self.inner.insert(ctx, page).await?;
        tracing::info!(page_id = %page.id, slug = %page.slug, "page created");
        Ok(())
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<Option<Page>> {
        self.inner.find_by_id(ctx, id).await
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        filter: &PageFilter,
    ) -> RepositoryResult<Paginated<Page>> {
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
impl MutableRepository<Page> for PageRepository {
    type Changes = PageChanges;

    async fn update(
        &self,
        ctx: &RequestContext,
        id: &str,
        changes: &PageChanges,
    ) -> RepositoryResult<()> {
        let id = parse_id(id)?;
        changes.validate()?;
        let update = Update::new()
            .set_some("title", changes.title.clone())
            .set_some("slug", changes.slug.clone())
            .set_some("content", changes.content.clone())
            .set_some("html", changes.html.clone())
            .set_some("template", changes.template.clone())
            .set_some("metaTitle", changes.meta_title.clone())
            .set_some("metaDescription", changes.meta_description.clone())
            .set_some("featuredImage", changes.featured_image.clone())
            .set_some("canonicalUrl", changes.canonical_url.clone())
            .set_some("publishedAt", changes.published_at.map(millis));
        let (update, schedule_pending) = apply_schedule(update, changes.status, changes.published_at);
        self.inner.update_by_id(ctx, id, update).await?;
        if schedule_pending && publishing::schedule_if_draft(&self.inner, ctx, id).await? {
            tracing::debug!(page_id = %id, "draft page scheduled");
        }
        Ok(())
    }

    async fn delete(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<()> {
        let id = parse_id(id)?;
        publishing::archive(&self.inner, ctx, id).await?;
        tracing::info!(page_id = %id, "page archived");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::SqliteDocumentStore;
    use chrono::Duration;

    fn repository() -> PageRepository {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        PageRepository::new(store.collection(PageRepository::COLLECTION).unwrap())
    }

    #[test]
    fn test_build_query() {
        assert!(PageRepository::build_query(&PageFilter::default()).is_empty());

        let filter = PageFilter {
            template: "wide".to_string(),
            author_id: "garbage".to_string(),
            keyword: "about".to_string(),
            ..Default::default()
        };
        let query = PageRepository::build_query(&filter);
        assert!(query.has_field("template"));
        assert!(!query.has_field("authorId"));
        assert_eq!(query.any_of.len(), 2);
    }

    #[test]
    fn test_build_sort_rejects_view_count() {
        let filter = PageFilter {
            sort_by: "viewCount".to_string(),
            sort_desc: false,
            ..Default::default()
        };
        assert_eq!(PageRepository::build_sort(&filter), Sort::desc("createdAt"));
    }

    #[tokio::test]
    async fn test_create_and_duplicate_slug() {
        let repo = repository();
        let ctx = RequestContext::new();
        repo.create_indexes(&ctx).await.unwrap();

        let mut about = Page::new("About", "Who we are", PostStatus::Published, ObjectId::new());
        repo.create(&ctx, &mut about).await.unwrap();
        let stored = repo.get_by_slug(&ctx, "about").await.unwrap().unwrap();
        assert_eq!(stored.template, "default");

        let mut again = Page::new("About", "Again", PostStatus::Draft, ObjectId::new());
        match repo.create(&ctx, &mut again).await {
            Err(RepositoryError::Conflict { field }) => assert_eq!(field, "slug"),
            other => panic!("expected conflict, got {other:?}"),
        }
        let all = repo.list(&ctx, &PageFilter::default()).await.unwrap();
        assert_eq!(all.total, 1);
    }

    #[tokio::test]
    async fn test_trash_rejected_on_create() {
        let repo = repository();
        let ctx = RequestContext::new();
        let mut trashed = Page::new("Gone", "x", PostStatus::Trash, ObjectId::new());
        assert!(matches!(
            repo.create(&ctx, &mut trashed).await,
            Err(RepositoryError::Validation(err)) if err.field == "status"
        ));
    }

    #[tokio::test]
    async fn test_template_lookup_and_schedule() {
        let repo = repository();
        let ctx = RequestContext::new();
        let mut landing = Page::new("Landing", "Hi", PostStatus::Draft, ObjectId::new());
        landing.template = "wide".to_string();
        repo.create(&ctx, &mut landing).await.unwrap();
        let id = landing.id.to_hex();

        let wide = repo
            .get_by_template(&ctx, "wide", &PageFilter::default())
            .await
            .unwrap();
        assert_eq!(wide.total, 1);
        assert!(matches!(
            repo.get_by_template(&ctx, "", &PageFilter::default()).await,
            Err(RepositoryError::Input(_))
        ));

        let changes = PageChanges {
            published_at: Some(now() + Duration::hours(3)),
            ..Default::default()
        };
        repo.update(&ctx, &id, &changes).await.unwrap();
        let stored = repo.get_by_id(&ctx, &id).await.unwrap().unwrap();
        assert!(stored.is_scheduled());
        assert!(repo.get_scheduled_pages(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_and_archive() {
        let repo = repository();
        let ctx = RequestContext::new();
        let mut page = Page::new("Contact", "Mail us", PostStatus::Draft, ObjectId::new());
        repo.create(&ctx, &mut page).await.unwrap();
        let id = page.id.to_hex();

        repo.publish(&ctx, &id).await.unwrap();
        let recent = repo.get_recent_pages(&ctx, 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert!(recent[0].published_at.is_some());

        repo.delete(&ctx, &id).await.unwrap();
        let stored = repo.get_by_id(&ctx, &id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Archived);
        assert!(repo.get_recent_pages(&ctx, 10).await.unwrap().is_empty());
    }
}
