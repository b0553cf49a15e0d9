use chrono::Duration;
use heimdall::application::dto::{
    CreatePostRequest, PageChanges, PageFilter, PostChanges, PostFilter, TagInfo,
};
use heimdall::application::{
    MutableRepository, PageRepository, PostRepository, Repository, RepositoryError,
    RequestContext, UserRepository,
};
use heimdall::domain::{
    now, ObjectId, Page, Post, PostStatus, PostType, PostVisibility, Tag, User, UserRole,
};
use heimdall::infrastructure::SqliteDocumentStore;

struct Fixture {
    posts: PostRepository,
    pages: PageRepository,
    users: UserRepository,
    ctx: RequestContext,
}

impl Fixture {
    async fn new() -> Self {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let fixture = Fixture {
            posts: PostRepository::new(store.collection(PostRepository::COLLECTION).unwrap()),
            pages: PageRepository::new(store.collection(PageRepository::COLLECTION).unwrap()),
            users: UserRepository::new(store.collection(UserRepository::COLLECTION).unwrap()),
            ctx: RequestContext::new(),
        };
        fixture.posts.create_indexes(&fixture.ctx).await.unwrap();
        fixture.pages.create_indexes(&fixture.ctx).await.unwrap();
        fixture.users.create_indexes(&fixture.ctx).await.unwrap();
        fixture
    }

    async fn published(&self, title: &str, views: i64, days_ago: i64) -> Post {
        let mut post = draft(title);
        post.status = PostStatus::Published;
        post.view_count = views;
        post.published_at = Some(now() - Duration::days(days_ago));
        self.posts.create(&self.ctx, &mut post).await.unwrap();
        post
    }

    async fn total_posts(&self) -> u64 {
        self.posts
            .list(&self.ctx, &PostFilter::default())
            .await
            .unwrap()
            .total
    }
}

fn draft(title: &str) -> Post {
    Post::new(
        title,
        format!("Notes about {title}."),
        PostType::Post,
        PostStatus::Draft,
        PostVisibility::Public,
        ObjectId::new(),
    )
}

fn assert_validation_field(result: Result<(), RepositoryError>, field: &str) {
    match result {
        Err(RepositoryError::Validation(err)) => assert_eq!(err.field, field),
        other => panic!("expected a validation error on {field}, got {other:?}"),
    }
}

#[tokio::test]
async fn test_create_then_get_returns_equal_post() {
    let fx = Fixture::new().await;
    let author = ObjectId::new();
    let request = CreatePostRequest {
        title: "Shipping Rust in Production".to_string(),
        markdown: "## Lessons\n\nOwnership makes refactors calm.".to_string(),
        tags: vec![
            TagInfo {
                name: "Rust Lang".to_string(),
                slug: String::new(),
            },
            TagInfo {
                name: "Ops".to_string(),
                slug: "operations".to_string(),
            },
        ],
        ..CreatePostRequest::default()
    };
    let mut post = Post::from_create_request(&request, author).unwrap();
    fx.posts.create(&fx.ctx, &mut post).await.unwrap();

    let stored = fx
        .posts
        .get_by_id(&fx.ctx, &post.id.to_hex())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, post);
    assert_eq!(stored.slug, "shipping-rust-in-production");
    assert_eq!(stored.status, PostStatus::Draft);
    assert_eq!(stored.tags[0].slug, "rust-lang");
    assert_eq!(stored.tags[1].slug, "operations");
    assert!(stored.word_count > 0);
    assert_eq!(stored.reading_time, 1);

    let by_slug = fx
        .posts
        .get_by_slug(&fx.ctx, "shipping-rust-in-production")
        .await
        .unwrap();
    assert_eq!(by_slug.map(|p| p.id), Some(post.id));
    assert!(fx.posts.get_by_slug(&fx.ctx, "nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_slug_is_a_conflict() {
    let fx = Fixture::new().await;
    let mut first = draft("Hello World");
    fx.posts.create(&fx.ctx, &mut first).await.unwrap();
    assert_eq!(first.slug, "hello-world");

    let mut second = draft("Another title");
    second.slug = "hello-world".to_string();
    let err = fx.posts.create(&fx.ctx, &mut second).await.unwrap_err();
    match err {
        RepositoryError::Conflict { field } => assert_eq!(field, "slug"),
        other => panic!("expected a conflict, got {other:?}"),
    }
    assert_eq!(fx.total_posts().await, 1);
}

#[tokio::test]
async fn test_scheduled_post_publishing() {
    let fx = Fixture::new().await;
    let mut post = draft("Release notes");
    post.status = PostStatus::Scheduled;
    post.published_at = Some(now() + Duration::hours(1));
    fx.posts.create(&fx.ctx, &mut post).await.unwrap();
    assert!(fx.posts.get_scheduled_posts(&fx.ctx).await.unwrap().is_empty());

    let due = now() - Duration::minutes(5);
    let changes = PostChanges {
        published_at: Some(due),
        ..PostChanges::default()
    };
    fx.posts
        .update(&fx.ctx, &post.id.to_hex(), &changes)
        .await
        .unwrap();

    let scheduled = fx.posts.get_scheduled_posts(&fx.ctx).await.unwrap();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].id, post.id);

    fx.posts.publish(&fx.ctx, &post.id.to_hex()).await.unwrap();
    let stored = fx
        .posts
        .get_by_id(&fx.ctx, &post.id.to_hex())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PostStatus::Published);
    assert_eq!(stored.published_at, Some(due));
    assert!(fx.posts.get_scheduled_posts(&fx.ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_future_date_schedules_a_draft() {
    let fx = Fixture::new().await;
    let mut post = draft("Coming soon");
    fx.posts.create(&fx.ctx, &mut post).await.unwrap();

    let changes = PostChanges {
        published_at: Some(now() + Duration::days(1)),
        ..PostChanges::default()
    };
    fx.posts
        .update(&fx.ctx, &post.id.to_hex(), &changes)
        .await
        .unwrap();
    let stored = fx
        .posts
        .get_by_id(&fx.ctx, &post.id.to_hex())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PostStatus::Scheduled);

    let past_schedule = PostChanges {
        status: Some(PostStatus::Scheduled),
        published_at: Some(now() - Duration::days(1)),
        ..PostChanges::default()
    };
    assert_validation_field(
        fx.posts
            .update(&fx.ctx, &post.id.to_hex(), &past_schedule)
            .await,
        "publishedAt",
    );
}

#[tokio::test]
async fn test_blank_tag_slug_derived_on_create() {
    let fx = Fixture::new().await;
    let mut post = draft("Frontend notes");
    post.tags = vec![Tag {
        name: "Web Dev".to_string(),
        slug: String::new(),
    }];
    fx.posts.create(&fx.ctx, &mut post).await.unwrap();

    let stored = fx
        .posts
        .get_by_id(&fx.ctx, &post.id.to_hex())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.tags[0].slug, "web-dev");
    let tagged = fx
        .posts
        .get_by_tag(&fx.ctx, "web-dev", &PostFilter::default())
        .await
        .unwrap();
    assert_eq!(tagged.total, 1);
}

#[tokio::test]
async fn test_scheduling_without_publish_time_is_rejected() {
    let fx = Fixture::new().await;
    let mut post = draft("Undated");
    fx.posts.create(&fx.ctx, &mut post).await.unwrap();
    let changes = PostChanges {
        status: Some(PostStatus::Scheduled),
        ..PostChanges::default()
    };
    assert_validation_field(
        fx.posts.update(&fx.ctx, &post.id.to_hex(), &changes).await,
        "publishedAt",
    );
    let stored = fx
        .posts
        .get_by_id(&fx.ctx, &post.id.to_hex())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PostStatus::Draft);
    assert_eq!(stored.published_at, None);

    let mut page = Page::new("Undated page", "Content.", PostStatus::Draft, ObjectId::new());
    fx.pages.create(&fx.ctx, &mut page).await.unwrap();
    let changes = PageChanges {
        status: Some(PostStatus::Scheduled),
        ..PageChanges::default()
    };
    assert_validation_field(
        fx.pages.update(&fx.ctx, &page.id.to_hex(), &changes).await,
        "publishedAt",
    );
}

#[tokio::test]
async fn test_huge_page_number_yields_empty_page() {
    let fx = Fixture::new().await;
    fx.published("Only one", 0, 1).await;
    let filter = PostFilter {
        page: i64::MAX,
        limit: 10,
        ..PostFilter::default()
    };
    let result = fx.posts.list(&fx.ctx, &filter).await.unwrap();
    assert_eq!(result.total, 1);
    assert!(result.items.is_empty());
}

#[tokio::test]
async fn test_publish_fills_missing_date_and_unpublish_keeps_it() {
    let fx = Fixture::new().await;
    let mut post = draft("Quick note");
    fx.posts.create(&fx.ctx, &mut post).await.unwrap();
    let id = post.id.to_hex();

    fx.posts.publish(&fx.ctx, &id).await.unwrap();
    let published = fx.posts.get_by_id(&fx.ctx, &id).await.unwrap().unwrap();
    assert!(published.published_at.is_some());

    fx.posts.unpublish(&fx.ctx, &id).await.unwrap();
    let unpublished = fx.posts.get_by_id(&fx.ctx, &id).await.unwrap().unwrap();
    assert_eq!(unpublished.status, PostStatus::Draft);
    assert_eq!(unpublished.published_at, published.published_at);

    fx.posts.delete(&fx.ctx, &id).await.unwrap();
    let archived = fx.posts.get_by_id(&fx.ctx, &id).await.unwrap().unwrap();
    assert_eq!(archived.status, PostStatus::Archived);
}

#[tokio::test]
async fn test_popular_posts_window() {
    let fx = Fixture::new().await;
    let mut ids = Vec::new();
    for (i, views) in [100, 50, 200, 10, 300].into_iter().enumerate() {
        let post = fx
            .published(&format!("Popular {i}"), views, (i as i64) + 1)
            .await;
        ids.push(post.id);
    }
    fx.published("Old but famous", 5_000, 45).await;
    let mut hidden = draft("Private favourite");
    hidden.status = PostStatus::Published;
    hidden.visibility = PostVisibility::Private;
    hidden.view_count = 9_000;
    hidden.published_at = Some(now() - Duration::days(1));
    fx.posts.create(&fx.ctx, &mut hidden).await.unwrap();

    let popular = fx.posts.get_popular_posts(&fx.ctx, 3, 30).await.unwrap();
    let got: Vec<_> = popular.iter().map(|p| p.id).collect();
    assert_eq!(got, vec![ids[4], ids[2], ids[0]]);

    let defaults = fx.posts.get_popular_posts(&fx.ctx, 0, 0).await.unwrap();
    assert_eq!(defaults.len(), 5);
}

#[tokio::test]
async fn test_view_counter_increments() {
    let fx = Fixture::new().await;
    let post = fx.published("Counted", 0, 1).await;
    for _ in 0..3 {
        fx.posts
            .increment_view_count(&fx.ctx, &post.id.to_hex())
            .await
            .unwrap();
    }
    let stored = fx
        .posts
        .get_by_id(&fx.ctx, &post.id.to_hex())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.view_count, 3);
}

#[tokio::test]
async fn test_keyword_filter_is_case_insensitive() {
    let fx = Fixture::new().await;
    let mut hello = draft("Hello World");
    let mut goodbye = draft("goodbye");
    fx.posts.create(&fx.ctx, &mut hello).await.unwrap();
    fx.posts.create(&fx.ctx, &mut goodbye).await.unwrap();

    let filter = PostFilter {
        keyword: "HELLO".to_string(),
        ..PostFilter::default()
    };
    let found = fx.posts.list(&fx.ctx, &filter).await.unwrap();
    assert_eq!(found.total, 1);
    assert_eq!(found.items.len(), 1);
    assert_eq!(found.items[0].id, hello.id);

    let literal = PostFilter {
        keyword: "hel.o".to_string(),
        ..PostFilter::default()
    };
    assert_eq!(fx.posts.list(&fx.ctx, &literal).await.unwrap().total, 0);
}

#[tokio::test]
async fn test_listing_filters_and_pagination_clamp() {
    let fx = Fixture::new().await;
    let author = ObjectId::new();
    for i in 0..12 {
        let mut post = draft(&format!("Entry {i:02}"));
        post.author_id = author;
        if i % 2 == 0 {
            post.tags = vec![Tag::new("Rust", "")];
        }
        fx.posts.create(&fx.ctx, &mut post).await.unwrap();
    }
    fx.posts.create(&fx.ctx, &mut draft("Someone else")).await.unwrap();

    let clamped = fx
        .posts
        .list(
            &fx.ctx,
            &PostFilter {
                page: -4,
                limit: 0,
                ..PostFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!((clamped.page, clamped.limit), (1, 10));
    assert_eq!(clamped.items.len(), 10);
    assert_eq!(clamped.total, 13);

    let capped = fx
        .posts
        .list(
            &fx.ctx,
            &PostFilter {
                limit: 500,
                ..PostFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(capped.limit, 100);
    assert_eq!(capped.items.len(), 13);

    let by_author = fx
        .posts
        .get_by_author(
            &fx.ctx,
            &author.to_hex(),
            &PostFilter {
                page: 2,
                limit: 5,
                ..PostFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_author.total, 12);
    assert_eq!(by_author.items.len(), 5);

    let tagged = fx
        .posts
        .get_by_tag(&fx.ctx, "rust", &PostFilter::default())
        .await
        .unwrap();
    assert_eq!(tagged.total, 6);

    let invalid_author = PostFilter {
        author_id: "zzz".to_string(),
        ..PostFilter::default()
    };
    assert_eq!(fx.posts.list(&fx.ctx, &invalid_author).await.unwrap().total, 13);
    assert!(matches!(
        fx.posts
            .get_by_author(&fx.ctx, "zzz", &PostFilter::default())
            .await,
        Err(RepositoryError::Input(_))
    ));

    let sorted = fx
        .posts
        .list(
            &fx.ctx,
            &PostFilter {
                sort_by: "title".to_string(),
                limit: 3,
                ..PostFilter::default()
            },
        )
        .await
        .unwrap();
    let titles: Vec<_> = sorted.items.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Entry 00", "Entry 01", "Entry 02"]);
}

#[tokio::test]
async fn test_post_boundaries() {
    let fx = Fixture::new().await;

    let mut longest = draft(&"a".repeat(255));
    fx.posts.create(&fx.ctx, &mut longest).await.unwrap();
    let mut too_long = draft(&"b".repeat(256));
    assert_validation_field(fx.posts.create(&fx.ctx, &mut too_long).await, "title");

    let mut big = draft("Big body");
    big.markdown = "x".repeat(1_000_000);
    fx.posts.create(&fx.ctx, &mut big).await.unwrap();
    let mut bigger = draft("Bigger body");
    bigger.markdown = "x".repeat(1_000_001);
    assert_validation_field(fx.posts.create(&fx.ctx, &mut bigger).await, "markdown");

    let mut tagged = draft("Twenty tags");
    tagged.tags = (0..20).map(|i| Tag::new(format!("tag{i}"), "")).collect();
    fx.posts.create(&fx.ctx, &mut tagged).await.unwrap();
    let mut over_tagged = draft("Too many tags");
    over_tagged.tags = (0..21).map(|i| Tag::new(format!("tag{i}"), "")).collect();
    assert_validation_field(fx.posts.create(&fx.ctx, &mut over_tagged).await, "tags");

    assert_eq!(fx.total_posts().await, 3);
}

#[tokio::test]
async fn test_pages_with_author_info() {
    let fx = Fixture::new().await;
    let mut author = User::new("sam", "sam@example.com", "h", "Sam", UserRole::Editor);
    fx.users.create(&fx.ctx, &mut author).await.unwrap();

    let mut about = Page::new("About Us", "Who we are.", PostStatus::Published, author.id);
    about.template = "landing".to_string();
    fx.pages.create(&fx.ctx, &mut about).await.unwrap();
    let mut draft_page = Page::new("Careers", "Jobs.", PostStatus::Draft, author.id);
    fx.pages.create(&fx.ctx, &mut draft_page).await.unwrap();

    let published = fx
        .pages
        .get_published_list(&fx.ctx, &PageFilter::default())
        .await.unwrap();
    assert_eq!(published.total, 1);

    let landing = fx
        .pages
        .get_by_template(&fx.ctx, "landing", &PageFilter::default())
        .await
        .unwrap();
    assert_eq!(landing.items[0].id, about.id);

    let keyword = PageFilter {
        keyword: "JOBS".to_string(),
        ..PageFilter::default()
    };
    assert_eq!(fx.pages.list(&fx.ctx, &keyword).await.unwrap().total, 1);

    let stored_author = fx
        .users
        .get_by_id(&fx.ctx, &about.author_id.to_hex())
        .await
        .unwrap()
        .unwrap();
    let response = about.to_detail_response(Some(stored_author.to_author_info()));
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["slug"], "about-us");
    assert_eq!(json["author"]["username"], "sam");
    assert!(json["author"].get("email").is_none());

    let trash = PageChanges {
        status: Some(PostStatus::Trash),
        ..PageChanges::default()
    };
    assert_validation_field(
        fx.pages
            .update(&fx.ctx, &draft_page.id.to_hex(), &trash)
            .await,
        "status",
    );
}
