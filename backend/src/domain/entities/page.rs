/// Page entity: a standalone post-like document rendered with a template
use super::post::{validate_body, validate_schedule, validate_seo, validate_slug, validate_title};
use crate::domain::base::{check_max_len, now, DomainResult, Entity, ValidationError};
use crate::domain::constants::{DEFAULT_TEMPLATE, TEMPLATE_MAX_LENGTH};
use crate::domain::content::generate_slug;
use crate::domain::value_objects::{ObjectId, PostStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    pub content: String,
    #[serde(default)]
    pub html: String,
    pub author_id: ObjectId,
    pub status: PostStatus,
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default)]
    pub meta_title: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub featured_image: String,
    #[serde(default)]
    pub canonical_url: String,
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

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

/// Pages never enter the trash state
pub(crate) fn validate_page_status(status: PostStatus) -> DomainResult<()> {
    if status == PostStatus::Trash {
        return Err(ValidationError::new("status", "invalid page status"));
    }
    Ok(())
}

pub(crate) fn validate_template(template: &str) -> DomainResult<()> {
    check_max_len(
        "template",
        template,
        TEMPLATE_MAX_LENGTH,
        "template name must not exceed 100 characters",
    )
}

impl Page {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        status: PostStatus,
        author_id: ObjectId,
    ) -> Self {
        let now = now();
        let mut page = Page {
            id: ObjectId::new(),
            title: title.into(),
            slug: String::new(),
            content: content.into(),
            html: String::new(),
            author_id,
            status,
            template: default_template(),
            meta_title: String::new(),
            meta_description: String::new(),
            featured_image: String::new(),
            canonical_url: String::new(),
            published_at: None,
            created_at: now,
            updated_at: now,
        };
        page.ensure_slug();
        page
    }

    pub fn validate_for_create(&self) -> DomainResult<()> {
        validate_title("title", &self.title)?;
        validate_body("content", &self.content)?;
        validate_slug(&self.slug)?;
        validate_page_status(self.status)?;
        validate_template(&self.template)?;
        validate_seo(&self.meta_title, &self.meta_description, &self.canonical_url)?;
        validate_schedule(self.status, self.published_at, Utc::now())
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

    pub fn can_be_published(&self) -> bool {
        matches!(self.status, PostStatus::Draft | PostStatus::Scheduled)
    }

    pub fn should_be_published_at(&self, at: DateTime<Utc>) -> bool {
        self.is_scheduled() && self.published_at.is_some_and(|instant| instant <= at)
    }

    pub fn should_be_published_now(&self) -> bool {
        self.should_be_published_at(Utc::now())
    }

    pub fn ensure_slug(&mut self) {
        if self.slug.is_empty() {
            self.slug = generate_slug(&self.title);
        }
    }

    pub fn prepare_for_insert(&mut self) {
        let now = now();
        self.created_at = now;
        self.updated_at = now;
        if self.template.is_empty() {
            self.template = default_template();
        }
        self.ensure_slug();
    }

    pub fn prepare_for_update(&mut self) {
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

    pub fn unpublish(&mut self) {
        self.status = PostStatus::Draft;
        self.updated_at = now();
    }

    pub fn archive(&mut self) {
        self.status = PostStatus::Archived;
        self.updated_at = now();
    }
}

impl Entity for Page {
    type Id = ObjectId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
