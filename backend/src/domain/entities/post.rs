/// Post entity: content rules, derived metrics and publication state
use crate::domain::base::{char_len, check_max_len, now, DomainResult, Entity, ValidationError};
use crate::domain::constants::*;
use crate::domain::content::{generate_excerpt, generate_slug, is_valid_slug, markdown_word_count};
use crate::domain::value_objects::{ObjectId, PostStatus, PostType, PostVisibility, Tag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub excerpt: String,
    pub markdown: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub featured_image: String,
    #[serde(rename = "type")]
    pub post_type: PostType,
    pub status: PostStatus,
    pub visibility: PostVisibility,
    pub author_id: ObjectId,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub meta_title: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub canonical_url: String,
    #[serde(default)]
    pub reading_time: i64,
    #[serde(default)]
    pub word_count: i64,
    #[serde(default)]
    pub view_count: i64,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

pub(crate) fn validate_title(field: &str, title: &str) -> DomainResult<()> {
    if title.is_empty() {
        return Err(ValidationError::new(field, "title is required"));
    }
    check_max_len(field, title, TITLE_MAX_LENGTH, "title must not exceed 255 characters")
}

/// Slugs are optional until insert; a present slug must be well formed.
pub(crate) fn validate_slug(slug: &str) -> DomainResult<()> {
    if slug.is_empty() {
        return Ok(());
    }
    check_max_len("slug", slug, SLUG_MAX_LENGTH, "slug must not exceed 255 characters")?;
    if !is_valid_slug(slug) {
        return Err(ValidationError::new(
            "slug",
            "slug may only contain lowercase letters, digits and single hyphens",
        ));
    }
    Ok(())
}

pub(crate) fn validate_body(field: &str, body: &str) -> DomainResult<()> {
    if body.is_empty() {
        return Err(ValidationError::new(field, format!("{field} is required")));
    }
    check_max_len(
        field,
        body,
        CONTENT_MAX_LENGTH,
        &format!("{field} must not exceed 1000000 characters"),
    )
}

pub(crate) fn validate_seo(
    meta_title: &str,
    meta_description: &str,
    canonical_url: &str,
) -> DomainResult<()> {
    check_max_len(
        "metaTitle",
        meta_title,
        META_TITLE_MAX_LENGTH,
        "meta title must not exceed 70 characters",
    )?;
    check_max_len(
        "metaDescription",
        meta_description,
        META_DESCRIPTION_MAX_LENGTH,
        "meta description must not exceed 160 characters",
    )?;
    check_max_len(
        "canonicalUrl",
        canonical_url,
        CANONICAL_URL_MAX_LENGTH,
        "canonical URL must not exceed 255 characters",
    )
}

pub(crate) fn validate_excerpt(excerpt: &str) -> DomainResult<()> {
    check_max_len(
        "excerpt",
        excerpt,
        EXCERPT_MAX_LENGTH,
        "excerpt must not exceed 500 characters",
    )
}

pub(crate) fn validate_tags(tags: &[Tag]) -> DomainResult<()> {
    if tags.len() > TAG_MAX_COUNT {
        return Err(ValidationError::new("tags", "a post can have at most 20 tags"));
    }
    for (i, tag) in tags.iter().enumerate() {
        let position = i + 1;
        if tag.name.trim().is_empty() {
            return Err(ValidationError::new(
                "tags",
                format!("tag {position} name is required"),
            ));
        }
        if char_len(&tag.name) > TAG_NAME_MAX_LENGTH {
            return Err(ValidationError::new(
                "tags",
                format!("tag {position} name must not exceed 50 characters"),
            ));
        }
        if !is_valid_slug(&tag.slug) {
            return Err(ValidationError::new(
                "tags",
                format!("tag {position} slug is invalid"),
            ));
        }
    }
    Ok(())
}

/// Scheduling requires a publish instant still ahead of `at`.
pub(crate) fn validate_schedule(
    status: PostStatus,
    published_at: Option<DateTime<Utc>>,
    at: DateTime<Utc>,
) -> DomainResult<()> {
    if status != PostStatus::Scheduled {
        return Ok(());
    }
    match published_at {
        Some(instant) if instant > at => Ok(()),
        Some(_) => Err(ValidationError::new(
            "publishedAt",
            "scheduled publish time must be in the future",
        )),
        None => Err(ValidationError::new(
            "publishedAt",
            "scheduled posts require a publish time",
        )),
    }
}

impl Post {
    /// Create a post in the given status with derived slug, excerpt and metrics
    pub fn new(
        title: impl Into<String>,
        markdown: impl Into<String>,
        post_type: PostType,
        status: PostStatus,
        visibility: PostVisibility,
        author_id: ObjectId,
    ) -> Self {
        let now = now();
        let mut post = Post {
            id: ObjectId::new(),
            title: title.into(),
            slug: String::new(),
            excerpt: String::new(),
            markdown: markdown.into(),
            html: String::new(),
            featured_image: String::new(),
            post_type,
            status,
            visibility,
            author_id,
            tags: Vec::new(),
            meta_title: String::new(),
            meta_description: String::new(),
            canonical_url: String::new(),
            reading_time: 0,
            word_count: 0,
            view_count: 0,
            published_at: None,
            created_at: now,
            updated_at: now,
        };
        post.ensure_slug();
        post.ensure_excerpt();
        post.update_content_metrics();
        post
    }

    /// Check every create-time rule, reporting the first one violated
    pub fn validate_for_create(&self) -> DomainResult<()> {
        validate_title("title", &self.title)?;
        validate_body("markdown", &self.markdown)?;
        validate_slug(&self.slug)?;
        validate_excerpt(&self.excerpt)?;
        validate_seo(&self.meta_title, &self.meta_description, &self.canonical_url)?;
        validate_tags(&self.tags)?;
        validate_schedule(self.status, self.published_at, Utc::now())?;
        if self.view_count < 0 {
            return Err(ValidationError::new("viewCount", "view count cannot be negative"));
        }
        Ok(())
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    pub fn is_draft(&self) -> bool {
        self.status == PostStatus::Draft
    }

    pub fn is_scheduled(&self) -> bool {
        self.status == PostStatus::Scheduled
    }

    pub fn is_public(&self) -> bool {
        self.visibility == PostVisibility::Public
    }

    pub fn can_be_published(&self) -> bool {
        matches!(self.status, PostStatus::Draft | PostStatus::Scheduled)
    }

    /// Scheduled and due at `at`
    pub fn should_be_published_at(&self, at: DateTime<Utc>) -> bool {
        self.is_scheduled() && self.published_at.is_some_and(|instant| instant <= at)
    }

    pub fn should_be_published_now(&self) -> bool {
        self.should_be_published_at(Utc::now())
    }

    pub fn generate_slug(&self) -> String {
        generate_slug(&self.title)
    }

    /// Fill the slug from the title only when absent
    pub fn ensure_slug(&mut self) {
        if self.slug.is_empty() {
            self.slug = self.generate_slug();
        }
    }

    /// Derive a slug from the name for every tag that has none
    pub fn ensure_tag_slugs(&mut self) {
        for tag in &mut self.tags {
            if tag.slug.trim().is_empty() {
                tag.slug = generate_slug(&tag.name);
            }
        }
    }

    pub fn generate_excerpt(&self, limit: usize) -> String {
        generate_excerpt(&self.markdown, limit)
    }

    pub fn ensure_excerpt(&mut self) {
        if self.excerpt.is_empty() {
            self.excerpt = self.generate_excerpt(DEFAULT_EXCERPT_LENGTH);
        }
    }

    pub fn calculate_word_count(&self) -> i64 {
        markdown_word_count(&self.markdown)
    }

    /// Recompute word count, then reading time from it
    pub fn update_content_metrics(&mut self) {
        self.word_count = self.calculate_word_count();
        self.reading_time = calculate_reading_time(self.word_count);
    }

    /// Stamp timestamps and fill derived fields for a fresh insert
    pub fn prepare_for_insert(&mut self) {
        let now = now();
        self.created_at = now;
        self.updated_at = now;
        self.ensure_tag_slugs();
        self.ensure_slug();
        self.ensure_excerpt();
        self.update_content_metrics();
    }

    pub fn prepare_for_update(&mut self) {
        self.updated_at = now();
        self.update_content_metrics();
    }

    pub fn increment_view_count(&mut self) {
        self.view_count += 1;
        self.updated_at = now();
    }

    /// Mark published; an existing publish instant is kept
    pub fn publish(&mut self) {
        let now = now();
        self.status = PostStatus::Published;
        if self.published_at.is_none() {
            self.published_at = Some(now);
        }
        self.updated_at = now;
    }

    /// Back to draft; the publish instant is preserved
    pub fn unpublish(&mut self) {
        self.status = PostStatus::Draft;
        self.updated_at = now();
    }

    /// Soft delete
    pub fn archive(&mut self) {
        self.status = PostStatus::Archived;
        self.updated_at = now();
    }
}

impl Entity for Post {
    type Id = ObjectId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
