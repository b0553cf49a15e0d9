/// Publication workflow shared by posts and pages
use super::base::{id_query, CollectionRepository, RepositoryResult, StoredEntity};
use super::query::{millis, Query, Update};
use crate::application::context::RequestContext;
use crate::domain::base::now;
use crate::domain::value_objects::{ObjectId, PostStatus};
use chrono::{DateTime, Utc};

/// `limit` below 1 becomes `default`; anything above `max` becomes `max`
pub fn clamp_limit(limit: i64, default: i64, max: i64) -> i64 {
    if limit < 1 {
        default
    } else {
        limit.min(max)
    }
}

/// Scheduled entries whose publish instant has passed at `at`
pub fn due_for_publish(at: DateTime<Utc>) -> Query {
    Query::new()
        .eq("status", PostStatus::Scheduled.as_str())
        .lte("publishedAt", millis(at))
}

/// Mark published; `publishedAt` is only filled when absent
pub async fn publish<T: StoredEntity>(
    repo: &CollectionRepository<T>,
    ctx: &RequestContext,
    id: ObjectId,
) -> RepositoryResult<()> {
    repo.update_by_id(
        ctx,
        id,
        Update::new().set("status", PostStatus::Published.as_str()),
    )
    .await?;
    let unstamped = id_query(id).exists("publishedAt", false);
    repo.update_where(ctx, unstamped, Update::new().set("publishedAt", millis(now())))
        .await?;
    Ok(())
}

pub async fn unpublish<T: StoredEntity>(
    repo: &CollectionRepository<T>,
    ctx: &RequestContext,
    id: ObjectId,
) -> RepositoryResult<()> {
    repo.update_by_id(ctx, id, Update::new().set("status", PostStatus::Draft.as_str()))
        .await
}

pub async fn archive<T: StoredEntity>(
    repo: &CollectionRepository<T>,
    ctx: &RequestContext,
    id: ObjectId,
) -> RepositoryResult<()> {
    repo.update_by_id(
        ctx,
        id,
        Update::new().set("status", PostStatus::Archived.as_str()),
    )
    .await
}

/// Scheduling part of a patch.
///
/// A future `publishedAt` turns an explicit draft status into `scheduled`.
/// Returns true when the patch leaves the status alone, in which case the
/// stored status still has to be checked with [`schedule_if_draft`].
pub fn apply_schedule(
    update: Update,
    status: Option<PostStatus>,
    published_at: Option<DateTime<Utc>>,
) -> (Update, bool) {
    let future = published_at.is_some_and(|at| at > now());
    match status {
        Some(PostStatus::Draft) if future => (
            update.set("status", PostStatus::Scheduled.as_str()),
            false,
        ),
        Some(status) => (update.set("status", status.as_str()), false),
        None => (update, future),
    }
}

/// Move a stored draft to `scheduled`
pub async fn schedule_if_draft<T: StoredEntity>(
    repo: &CollectionRepository<T>,
    ctx: &RequestContext,
    id: ObjectId,
) -> RepositoryResult<bool> {
    let guard = id_query(id).eq("status", PostStatus::Draft.as_str());
    repo.update_where(
        ctx,
        guard,
        Update::new().set("status", PostStatus::Scheduled.as_str()),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::Value;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(0, 10, 100), 10);
        assert_eq!(clamp_limit(-5, 100, 1000), 100);
        assert_eq!(clamp_limit(7, 10, 100), 7);
        assert_eq!(clamp_limit(101, 10, 100), 100);
    }

    #[test]
    fn test_due_for_publish_query() {
        let query = due_for_publish(now());
        assert!(query.has_field("status"));
        assert!(query.has_field("publishedAt"));
    }

    #[test]
    fn test_apply_schedule_explicit_draft() {
        let later = now() + Duration::hours(2);
        let (update, pending) = apply_schedule(Update::new(), Some(PostStatus::Draft), Some(later));
        assert!(!pending);
        assert_eq!(update.set_value("status"), Some(&Value::from("scheduled")));
    }

    #[test]
    fn test_apply_schedule_without_status() {
        let later = now() + Duration::hours(2);
        let (update, pending) = apply_schedule(Update::new(), None, Some(later));
        assert!(pending);
        assert!(update.is_empty());

        let earlier = now() - Duration::hours(2);
        let (_, pending) = apply_schedule(Update::new(), None, Some(earlier));
        assert!(!pending);
    }

    #[test]
    fn test_apply_schedule_keeps_other_status() {
        let later = now() + Duration::hours(2);
        let (update, pending) =
            apply_schedule(Update::new(), Some(PostStatus::Published), Some(later));
        assert!(!pending);
        assert_eq!(update.set_value("status"), Some(&Value::from("published")));
    }
}
