pub mod login_log;
pub mod page;
pub mod post;
pub mod user;

pub use login_log::{LoginLogCreateRequest, LoginLogFilter, LoginLogListItem};
pub use page::{CreatePageRequest, PageChanges, PageDetailResponse, PageFilter, PageListItem};
pub use post::{CreatePostRequest, PostChanges, PostDetailResponse, PostFilter, PostListItem, TagInfo};
pub use user::{AuthorInfo, CreateUserRequest, UserChanges, UserFilter, UserListItem, UserProfileResponse};

/// Resolve a requested sort key against the allowed document fields.
///
/// Accepts the field name itself (`createdAt`) or its snake_case spelling
/// (`created_at`); anything else yields `None`.
pub fn resolve_sort_field(requested: &str, allowed: &[&'static str]) -> Option<&'static str> {
    if requested.is_empty() {
        return None;
    }
    let camel = snake_to_camel(requested);
    allowed.iter().copied().find(|field| *field == camel)
}

fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for c in key.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}
