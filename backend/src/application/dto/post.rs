use super::user::AuthorInfo;
use crate::domain::base::{check_max_len, DomainResult, ValidationError};
use crate::domain::constants::*;
use crate::domain::entities::post::{
    validate_body, validate_excerpt, validate_schedule, validate_slug, validate_tags,
    validate_title,
};
use crate::domain::entities::Post;
use crate::domain::value_objects::{
    parse_optional, ObjectId, PostStatus, PostType, PostVisibility, Tag,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag as supplied by callers; a blank slug is derived from the name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagInfo {
    pub name: String,
    pub slug: String,
}

impl TagInfo {
    pub fn to_tag(&self) -> Tag {
        Tag::new(self.name.clone(), self.slug.clone())
    }
}

pub fn to_tags(tags: &[TagInfo]) -> Vec<Tag> {
    tags.iter().map(TagInfo::to_tag).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreatePostRequest {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub markdown: String,
    pub html: String,
    pub featured_image: String,
    /// Defaults to `post`
    #[serde(rename = "type")]
    pub post_type: String,
    /// Defaults to `draft`
    pub status: String,
    /// Defaults to `public`
    pub visibility: String,
    pub tags: Vec<TagInfo>,
    pub meta_title: String,
    pub meta_description: String,
    pub canonical_url: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// A partial post update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub markdown: Option<String>,
    pub html: Option<String>,
    pub featured_image: Option<String>,
    #[serde(rename = "type")]
    pub post_type: Option<PostType>,
    pub status: Option<PostStatus>,
    pub visibility: Option<PostVisibility>,
    pub tags: Option<Vec<TagInfo>>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub canonical_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Shared by post and page patches: an explicit scheduled status must carry
/// a publish time that is still ahead
pub(crate) fn validate_schedule_change(
    status: Option<PostStatus>,
    published_at: Option<DateTime<Utc>>,
) -> DomainResult<()> {
    match status {
        Some(PostStatus::Scheduled) => {
            validate_schedule(PostStatus::Scheduled, published_at, Utc::now())
        }
        _ => Ok(()),
    }
}

impl PostChanges {
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
        if let Some(excerpt) = &self.excerpt {
            validate_excerpt(excerpt)?;
        }
        if let Some(markdown) = &self.markdown {
            validate_body("markdown", markdown)?;
        }
        if let Some(meta_title) = &self.meta_title {
            check_max_len(
                "metaTitle",
                meta_title,
                META_TITLE_MAX_LENGTH,
                "meta title must not exceed 70 characters",
            )?;
        }
        if let Some(meta_description) = &self.meta_description {
            check_max_len(
                "metaDescription",
                meta_description,
                META_DESCRIPTION_MAX_LENGTH,
                "meta description must not exceed 160 characters",
            )?;
        }
        if let Some(canonical_url) = &self.canonical_url {
            check_max_len(
                "canonicalUrl",
                canonical_url,
                CANONICAL_URL_MAX_LENGTH,
                "canonical URL must not exceed 255 characters",
            )?;
        }
        if let Some(tags) = &self.tags {
            validate_tags(&to_tags(tags))?;
        }
        validate_schedule_change(self.status, self.published_at)
    }

    pub fn is_empty(&self) -> bool {
        *self == PostChanges::default()
    }
}

/// Filter for post listings. Empty strings mean "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostFilter {
    pub status: String,
    #[serde(rename = "type")]
    pub post_type: String,
    pub visibility: String,
    /// Hex id; an unparsable id is ignored
    pub author_id: String,
    /// Tag slug
    pub tag: String,
    /// Matches title, excerpt or markdown
    pub keyword: String,
    pub page: i64,
    pub limit: i64,
    pub sort_by: String,
    pub sort_desc: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetailResponse {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub markdown: String,
    pub html: String,
    pub featured_image: String,
    #[serde(rename = "type")]
    pub post_type: PostType,
    pub status: PostStatus,
    pub visibility: PostVisibility,
    pub author_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorInfo>,
    pub tags: Vec<Tag>,
    pub meta_title: String,
    pub meta_description: String,
    pub canonical_url: String,
    pub reading_time: i64,
    pub word_count: i64,
    pub view_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListItem {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub featured_image: String,
    #[serde(rename = "type")]
    pub post_type: PostType,
    pub status: PostStatus,
    pub visibility: PostVisibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorInfo>,
    pub tags: Vec<Tag>,
    pub reading_time: i64,
    pub view_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Build a post from a create request, applying type/status/visibility
    /// defaults and deriving slug, excerpt and metrics
    pub fn from_create_request(req: &CreatePostRequest, author_id: ObjectId) -> DomainResult<Post> {
        let post_type = parse_optional(&req.post_type)?.unwrap_or(PostType::Post);
        let status = parse_optional(&req.status)?.unwrap_or(PostStatus::Draft);
        let visibility = parse_optional(&req.visibility)?.unwrap_or(PostVisibility::Public);

        let mut post = Post::new(
            req.title.clone(),
            req.markdown.clone(),
            post_type,
            status,
            visibility,
            author_id,
        );
        if !req.slug.is_empty() {
            post.slug = req.slug.clone();
        }
        if !req.excerpt.is_empty() {
            post.excerpt = req.excerpt.clone();
        }
        post.html = req.html.clone();
        post.featured_image = req.featured_image.clone();
        post.tags = to_tags(&req.tags);
        post.meta_title = req.meta_title.clone();
        post.meta_description = req.meta_description.clone();
        post.canonical_url = req.canonical_url.clone();
        post.published_at = req.published_at;
        Ok(post)
    }

    pub fn to_detail_response(&self, author: Option<AuthorInfo>) -> PostDetailResponse {
        PostDetailResponse {
            id: self.id.to_hex(),
            title: self.title.clone(),
            slug: self.slug.clone(),
            excerpt: self.excerpt.clone(),
            markdown: self.markdown.clone(),
            html: self.html.clone(),
            featured_image: self.featured_image.clone(),
            post_type: self.post_type,
            status: self.status,
            visibility: self.visibility,
            author_id: self.author_id.to_hex(),
            author,
            tags: self.tags.clone(),
            meta_title: self.meta_title.clone(),
            meta_description: self.meta_description.clone(),
            canonical_url: self.canonical_url.clone(),
            reading_time: self.reading_time,
            word_count: self.word_count,
            view_count: self.view_count,
            published_at: self.published_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn to_list_item(&self, author: Option<AuthorInfo>) -> PostListItem {
        PostListItem {
            id: self.id.to_hex(),
            title: self.title.clone(),
            slug: self.slug.clone(),
            excerpt: self.excerpt.clone(),
            featured_image: self.featured_image.clone(),
            post_type: self.post_type,
            status: self.status,
            visibility: self.visibility,
            author,
            tags: self.tags.clone(),
            reading_time: self.reading_time,
            view_count: self.view_count,
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
    fn test_from_create_request_defaults() {
        let req = CreatePostRequest {
            title: "Hello World".to_string(),
            markdown: "Some words to count".to_string(),
            tags: vec![TagInfo {
                name: "Rust Lang".to_string(),
                slug: String::new(),
            }],
            ..Default::default()
        };
        let post = Post::from_create_request(&req, ObjectId::new()).unwrap();
        assert_eq!(post.post_type, PostType::Post);
        assert_eq!(post.status, PostStatus::Draft);
        assert_eq!(post.visibility, PostVisibility::Public);
        assert_eq!(post.slug, "hello-world");
        assert_eq!(post.word_count, 4);
        assert_eq!(post.tags[0].slug, "rust-lang");
    }

    #[test]
    fn test_from_create_request_rejects_bad_enum() {
        let req = CreatePostRequest {
            title: "t".to_string(),
            markdown: "m".to_string(),
            visibility: "friends".to_string(),
            ..Default::default()
        };
        let err = Post::from_create_request(&req, ObjectId::new()).unwrap_err();
        assert_eq!(err.field, "visibility");
    }

    #[test]
    fn test_changes_validation() {
        assert!(PostChanges::default().validate().is_ok());
        assert!(PostChanges::default().is_empty());

        let changes = PostChanges {
            title: Some("x".repeat(256)),
            ..Default::default()
        };
        assert_eq!(changes.validate().unwrap_err().field, "title");

        let changes = PostChanges {
            slug: Some("Not A Slug".to_string()),
            ..Default::default()
        };
        assert_eq!(changes.validate().unwrap_err().field, "slug");

        let changes = PostChanges {
            tags: Some((0..21).map(|i| TagInfo { name: format!("t{i}"), slug: String::new() }).collect()),
            ..Default::default()
        };
        assert_eq!(changes.validate().unwrap_err().field, "tags");

        let changes = PostChanges {
            status: Some(PostStatus::Scheduled),
            published_at: Some(Utc::now() - Duration::hours(1)),
            ..Default::default()
        };
        assert_eq!(changes.validate().unwrap_err().field, "publishedAt");
    }

    #[test]
    fn test_scheduled_status_needs_publish_time() {
        let changes = PostChanges {
            status: Some(PostStatus::Scheduled),
            ..Default::default()
        };
        let err = changes.validate().unwrap_err();
        assert_eq!(err.field, "publishedAt");
        assert_eq!(err.message, "scheduled posts require a publish time");

        let changes = PostChanges {
            status: Some(PostStatus::Scheduled),
            published_at: Some(Utc::now() + Duration::hours(1)),
            ..Default::default()
        };
        assert!(changes.validate().is_ok());
    }

    #[test]
    fn test_detail_response_shape() {
        let post = Post::from_create_request(
            &CreatePostRequest {
                title: "Shape".to_string(),
                markdown: "body".to_string(),
                ..Default::default()
            },
            ObjectId::new(),
        )
        .unwrap();
        let author = AuthorInfo {
            id: post.author_id.to_hex(),
            username: "dave".to_string(),
            display_name: "Dave".to_string(),
            profile_image: String::new(),
            bio: String::new(),
        };
        let value = serde_json::to_value(post.to_detail_response(Some(author))).unwrap();
        assert_eq!(value["type"], "post");
        assert_eq!(value["author"]["username"], "dave");
        assert!(value.get("publishedAt").is_none());

        let value = serde_json::to_value(post.to_list_item(None)).unwrap();
        assert!(value.get("author").is_none());
        assert!(value.get("markdown").is_none());
    }
}
