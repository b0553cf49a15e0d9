use super::post::validate_schedule_change;
use super::user::AuthorInfo;
use crate::domain::base::{check_max_len, DomainResult, ValidationError};
use crate::domain::constants::*;
use crate::domain::entities::page::{validate_page_status, validate_template};
use crate::domain::entities::post::{validate_body, validate_slug, validate_title};
use crate::domain::entities::Page;
use crate::domain::value_objects::{parse_optional, ObjectId, PostStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreatePageRequest {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub html: String,
    /// Defaults to `default`
    pub template: String,
    /// Defaults to `draft`
    pub status: String,
    pub meta_title: String,
    pub meta_description: String,
    pub featured_image: String,
    pub canonical_url: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageChanges {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub html: Option<String>,
    pub template: Option<String>,
    pub status: Option<PostStatus>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub featured_image: Option<String>,
    pub canonical_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl PageChanges {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(title) = &self.title {
            validate_title("title", title)?;
        }
        if let Some(slug) = &self.slug {
            if slug.is_empty() {
                return Err(ValidationError::new("slug", "slug cannot be empty"));
            }
            validate_slug(slug)?;
        }
        if let Some(content) = &self.content {
            validate_body("content", content)?;
        }
        if let Some(template) = &self.template {
            validate_template(template)?;
        }
        if let Some(status) = self.status {
            validate_page_status(status)?;
        }
        for (field, value, max, message) in [
            (
                "metaTitle",
                &self.meta_title,
                META_TITLE_MAX_LENGTH,
                "meta title must not exceed 70 characters",
            ),
            (
                "metaDescription",
                &self.meta_description,
                META_DESCRIPTION_MAX_LENGTH,
                "meta description must not exceed 160 characters",
            ),
            (
                "canonicalUrl",
                &self.canonical_url,
                CANONICAL_URL_MAX_LENGTH,
                "canonical URL must not exceed 255 characters",
            ),
        ] {
            if let Some(value) = value {
                check_max_len(field, value, max, message)?;
            }
        }
        validate_schedule_change(self.status, self.published_at)
    }

    pub fn is_empty(&self) -> bool {
        *self == PageChanges::default()
    }
}

/// Filter for page listings. Empty strings mean "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageFilter {
    pub status: String,
    pub template: String,
    pub author_id: String,
    /// Matches title or content
    pub keyword: String,
    pub page: i64,
    pub limit: i64,
    pub sort_by: String,
    pub sort_desc: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDetailResponse {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub html: String,
    pub author_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorInfo>,
    pub status: PostStatus,
    pub template: String,
    pub meta_title: String,
    pub meta_description: String,
    pub featured_image: String,
    pub canonical_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageListItem {
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorInfo>,
    pub status: PostStatus,
    pub template: String,
    pub featured_image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    pub fn from_create_request(req: &CreatePageRequest, author_id: ObjectId) -> DomainResult<Page> {
        let status = parse_optional(&req.status)?.unwrap_or(PostStatus::Draft);
        let mut page = Page::new(req.title.clone(), req.content.clone(), status, author_id);
        if !req.slug.is_empty() {
            page.slug = req.slug.clone();
        }
        if !req.template.is_empty() {
            page.template = req.template.clone();
        }
        page.html = req.html.clone();
        page.meta_title = req.meta_title.clone();
        page.meta_description = req.meta_description.clone();
        page.featured_image = req.featured_image.clone();
        page.canonical_url = req.canonical_url.clone();
        page.published_at = req.published_at;
        Ok(page)
    }

    pub fn to_detail_response(&self, author: Option<AuthorInfo>) -> PageDetailResponse {
        PageDetailResponse {
            id: self.id.to_hex(),
            title: self.title.clone(),
            slug: self.slug.clone(),
            content: self.content.clone(),
            html: self.html.clone(),
            author_id: self.author_id.to_hex(),
            author,
            status: self.status,
            template: self.template.clone(),
            meta_title: self.meta_title.clone(),
            meta_description: self.meta_description.clone(),
            featured_image: self.featured_image.clone(),
            canonical_url: self.canonical_url.clone(),
            published_at: self.published_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn to_list_item(&self, author: Option<AuthorInfo>) -> PageListItem {
        PageListItem {
            id: self.id.to_hex(),
            title: self.title.clone(),
            slug: self.slug.clone(),
            author,
            status: self.status,
            template: self.template.clone(),
            featured_image: self.featured_image.clone(),
            published_at: self.published_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_from_create_request() {
        let req = CreatePageRequest {
            title: "Contact".to_string(),
            content: "Write to us".to_string(),
            ..Default::default()
        };
        let page = Page::from_create_request(&req, ObjectId::new()).unwrap();
        assert_eq!(page.slug, "contact");
        assert_eq!(page.template, "default");
        assert_eq!(page.status, PostStatus::Draft);
    }

    #[test]
    fn test_from_create_request_custom_template() {
        let req = CreatePageRequest {
            title: "Landing".to_string(),
            content: "Hi".to_string(),
            template: "wide".to_string(),
            status: "published".to_string(),
            ..Default::default()
        };
        let page = Page::from_create_request(&req, ObjectId::new()).unwrap();
        assert_eq!(page.template, "wide");
        assert!(page.is_published());
    }

    #[test]
    fn test_changes_reject_trash_and_long_template() {
        let changes = PageChanges {
            status: Some(PostStatus::Trash),
            ..Default::default()
        };
        assert_eq!(changes.validate().unwrap_err().field, "status");

        let changes = PageChanges {
            template: Some("t".repeat(101)),
            ..Default::default()
        };
        assert_eq!(changes.validate().unwrap_err().field, "template");

        let changes = PageChanges {
            meta_description: Some("d".repeat(161)),
            ..Default::default()
        };
        assert_eq!(changes.validate().unwrap_err().field, "metaDescription");
    }

    #[test]
    fn test_scheduled_status_needs_future_publish_time() {
        let changes = PageChanges {
            status: Some(PostStatus::Scheduled),
            ..Default::default()
        };
        assert_eq!(changes.validate().unwrap_err().field, "publishedAt");

        let changes = PageChanges {
            status: Some(PostStatus::Scheduled),
            published_at: Some(Utc::now() - Duration::minutes(1)),
            ..Default::default()
        };
        assert_eq!(changes.validate().unwrap_err().field, "publishedAt");
    }

    #[test]
    fn test_list_item_omits_content() {
        let page = Page::new("About", "content", PostStatus::Draft, ObjectId::new());
        let value = serde_json::to_value(page.to_list_item(None)).unwrap();
        assert!(value.get("content").is_none());
        assert_eq!(value["template"], "default");
    }
}
