use crate::domain::base::{check_max_len, DomainResult};
use crate::domain::constants::*;
use crate::domain::entities::user::{
    validate_display_name, validate_email, validate_profile_fields, validate_username,
};
use crate::domain::entities::User;
use crate::domain::value_objects::{UserRole, UserStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    /// Plain text; hashed by the caller before the user is built
    pub password: String,
    pub display_name: String,
    pub role: String,
    pub bio: String,
    pub location: String,
    pub website: String,
    pub twitter: String,
    pub facebook: String,
}

/// A partial user update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub profile_image: Option<String>,
    pub cover_image: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub facebook: Option<String>,
}

impl UserChanges {
    /// Check the provided fields against the create-time caps
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(username) = &self.username {
            validate_username(username)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(display_name) = &self.display_name {
            validate_display_name(display_name)?;
        }
        let field = |value: &Option<String>| value.as_deref().unwrap_or_default().to_string();
        validate_profile_fields(
            &field(&self.bio),
            &field(&self.location),
            &field(&self.website),
            &field(&self.twitter),
            &field(&self.facebook),
        )?;
        for (name, value) in [
            ("profileImage", &self.profile_image),
            ("coverImage", &self.cover_image),
        ] {
            if let Some(url) = value {
                check_max_len(name, url, WEBSITE_MAX_LENGTH, "image URL must not exceed 255 characters")?;
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == UserChanges::default()
    }
}

/// Filter for user listings. Empty strings mean "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserFilter {
    pub role: String,
    pub status: String,
    /// Matches username, email or display name
    pub keyword: String,
    pub page: i64,
    pub limit: i64,
    pub sort_by: String,
    pub sort_desc: bool,
}

/// Full outward view of a user; never carries the password hash
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub profile_image: String,
    pub cover_image: String,
    pub bio: String,
    pub location: String,
    pub website: String,
    pub twitter: String,
    pub facebook: String,
    pub status: UserStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListItem {
    pub id: String,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub profile_image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Compact public projection of a user, embedded in post and page responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorInfo {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub profile_image: String,
    pub bio: String,
}

impl User {
    /// Build an active user from a registration request; the role must be
    /// one of the known roles
    pub fn from_create_request(
        req: &CreateUserRequest,
        password_hash: impl Into<String>,
    ) -> DomainResult<User> {
        let role: UserRole = req.role.parse()?;
        let mut user = User::new(
            req.username.clone(),
            req.email.clone(),
            password_hash,
            req.display_name.clone(),
            role,
        );
        user.bio = req.bio.clone();
        user.location = req.location.clone();
        user.website = req.website.clone();
        user.twitter = req.twitter.clone();
        user.facebook = req.facebook.clone();
        Ok(user)
    }

    pub fn to_profile_response(&self) -> UserProfileResponse {
        UserProfileResponse {
            id: self.id.to_hex(),
            username: self.username.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            profile_image: self.profile_image.clone(),
            cover_image: self.cover_image.clone(),
            bio: self.bio.clone(),
            location: self.location.clone(),
            website: self.website.clone(),
            twitter: self.twitter.clone(),
            facebook: self.facebook.clone(),
            status: self.status,
            last_login_at: self.last_login_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn to_list_item(&self) -> UserListItem {
        UserListItem {
            id: self.id.to_hex(),
            username: self.username.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            status: self.status,
            profile_image: self.profile_image.clone(),
            last_login_at: self.last_login_at,
            created_at: self.created_at,
        }
    }

    pub fn to_author_info(&self) -> AuthorInfo {
        AuthorInfo {
            id: self.id.to_hex(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            profile_image: self.profile_image.clone(),
            bio: self.bio.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateUserRequest {
        CreateUserRequest {
            username: "carol".to_string(),
            email: "carol@example.com".to_string(),
            password: "correct horse".to_string(),
            display_name: "Carol".to_string(),
            role: "editor".to_string(),
            bio: "Writes about Rust".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_from_create_request() {
        let user = User::from_create_request(&request(), "hash").unwrap();
        assert_eq!(user.role, UserRole::Editor);
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.password_hash, "hash");
        assert_eq!(user.bio, "Writes about Rust");
    }

    #[test]
    fn test_from_create_request_rejects_unknown_role() {
        let mut req = request();
        req.role = "root".to_string();
        let err = User::from_create_request(&req, "hash").unwrap_err();
        assert_eq!(err.field, "role");
    }

    #[test]
    fn test_profile_response_omits_password_hash() {
        let user = User::from_create_request(&request(), "secret-hash").unwrap();
        let json = serde_json::to_string(&user.to_profile_response()).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(!json.contains("passwordHash"));
        assert!(json.contains("\"displayName\":\"Carol\""));
    }

    #[test]
    fn test_author_info_projection() {
        let user = User::from_create_request(&request(), "hash").unwrap();
        let author = user.to_author_info();
        assert_eq!(author.id, user.id.to_hex());
        assert_eq!(author.bio, "Writes about Rust");
    }

    #[test]
    fn test_changes_validate_only_provided_fields() {
        let changes = UserChanges {
            bio: Some("b".repeat(500)),
            ..Default::default()
        };
        assert!(changes.validate().is_ok());

        let changes = UserChanges {
            username: Some("ab".to_string()),
            ..Default::default()
        };
        assert_eq!(changes.validate().unwrap_err().field, "username");

        let changes = UserChanges {
            location: Some("l".repeat(101)),
            ..Default::default()
        };
        assert_eq!(changes.validate().unwrap_err().field, "location");

        assert!(UserChanges::default().is_empty());
    }

    #[test]
    fn test_filter_deserializes_with_defaults() {
        let filter: UserFilter = serde_json::from_str(r#"{"role":"admin","sortDesc":true}"#).unwrap();
        assert_eq!(filter.role, "admin");
        assert!(filter.sort_desc);
        assert_eq!(filter.page, 0);
        assert!(filter.keyword.is_empty());
    }
}
