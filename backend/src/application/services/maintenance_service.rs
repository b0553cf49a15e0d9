/// Periodic sweep: publish due content and release expired locks
use crate::application::context::RequestContext;
use crate::application::repositories::{
    PageRepository, PostRepository, Repository, RepositoryResult, UserRepository,
};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// Counts from one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub posts_published: usize,
    pub pages_published: usize,
    pub users_unlocked: usize,
    /// Individual publish/unlock writes that failed
    pub failures: usize,
    pub duration_ms: u64,
}

impl SweepReport {
    pub fn changed(&self) -> usize {
        self.posts_published + self.pages_published + self.users_unlocked
    }
}

#[derive(Clone)]
pub struct MaintenanceService {
    users: UserRepository,
    posts: PostRepository,
    pages: PageRepository,
}

impl MaintenanceService {
    pub fn new(users: UserRepository, posts: PostRepository, pages: PageRepository) -> Self {
        MaintenanceService { users, posts, pages }
    }

    /// Provision the indexes of every collection the sweep touches
    pub async fn ensure_indexes(&self, ctx: &RequestContext) -> RepositoryResult<()> {
        self.users.create_indexes(ctx).await?;
        self.posts.create_indexes(ctx).await?;
        self.pages.create_indexes(ctx).await?;
        Ok(())
    }

    /// Run one sweep. Failing scans abort the sweep; a failing write on a
    /// single entry is logged, counted and skipped.
    pub async fn run_sweep(&self, ctx: &RequestContext) -> RepositoryResult<SweepReport> {
        let start_time = Instant::now();
        let mut report = SweepReport::default();

        for post in self.posts.get_scheduled_posts(ctx).await? {
            match self.posts.publish(ctx, &post.id.to_hex()).await {
                Ok(()) => report.posts_published += 1,
                Err(e) => {
                    warn!(post_id = %post.id, error = %e, "failed to publish scheduled post");
                    report.failures += 1;
                }
            }
        }

        for page in self.pages.get_scheduled_pages(ctx).await? {
            match self.pages.publish(ctx, &page.id.to_hex()).await {
                Ok(()) => report.pages_published += 1,
                Err(e) => {
                    warn!(page_id = %page.id, error = %e, "failed to publish scheduled page");
                    report.failures += 1;
                }
            }
        }

        for user in self.users.list_expired_locks(ctx).await? {
            match self.users.unlock_user(ctx, &user.id.to_hex()).await {
                Ok(()) => report.users_unlocked += 1,
                Err(e) => {
                    warn!(user_id = %user.id, error = %e, "failed to release expired lock");
                    report.failures += 1;
                }
            }
        }

        report.duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            posts_published = report.posts_published,
            pages_published = report.pages_published,
            users_unlocked = report.users_unlocked,
            failures = report.failures,
            duration_ms = report.duration_ms,
            "maintenance sweep finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::SqliteDocumentStore;

    #[tokio::test]
    async fn test_sweep_on_empty_store() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let service = MaintenanceService::new(
            UserRepository::new(store.collection(UserRepository::COLLECTION).unwrap()),
            PostRepository::new(store.collection(PostRepository::COLLECTION).unwrap()),
            PageRepository::new(store.collection(PageRepository::COLLECTION).unwrap()),
        );
        let ctx = RequestContext::new();
        service.ensure_indexes(&ctx).await.unwrap();

        let report = service.run_sweep(&ctx).await.unwrap();
        assert_eq!(report.changed(), 0);
        assert_eq!(report.failures, 0);
    }

    #[tokio::test]
    async fn test_cancelled_sweep_fails() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let service = MaintenanceService::new(
            UserRepository::new(store.collection(UserRepository::COLLECTION).unwrap()),
            PostRepository::new(store.collection(PostRepository::COLLECTION).unwrap()),
            PageRepository::new(store.collection(PageRepository::COLLECTION).unwrap()),
        );
        let ctx = RequestContext::new();
        ctx.cancel();
        assert!(service.run_sweep(&ctx).await.is_err());
    }
}
