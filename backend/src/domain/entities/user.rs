/// User entity and the account lockout state machine
use crate::domain::base::{char_len, check_max_len, now, DomainResult, Entity, ValidationError};
use crate::domain::constants::*;
use crate::domain::value_objects::{ObjectId, UserRole, UserStatus};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// An administrative account.
///
/// The password hash is persisted with the document but never leaves the
/// repository layer: every outward shape is built by the DTO converters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: UserRole,
    #[serde(default)]
    pub profile_image: String,
    #[serde(default)]
    pub cover_image: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub twitter: String,
    #[serde(default)]
    pub facebook: String,
    pub status: UserStatus,
    #[serde(default)]
    pub login_fail_count: i64,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub locked_until: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(rename = "lastLoginIP", default)]
    pub last_login_ip: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$").unwrap()
    })
}

pub(crate) fn validate_username(username: &str) -> DomainResult<()> {
    if username.is_empty() {
        return Err(ValidationError::new("username", "username is required"));
    }
    let len = char_len(username);
    if len < USERNAME_MIN_LENGTH {
        return Err(ValidationError::new(
            "username",
            "username must be at least 3 characters",
        ));
    }
    if len > USERNAME_MAX_LENGTH {
        return Err(ValidationError::new(
            "username",
            "username must not exceed 32 characters",
        ));
    }
    Ok(())
}

pub(crate) fn validate_email(email: &str) -> DomainResult<()> {
    if email.is_empty() {
        return Err(ValidationError::new("email", "email is required"));
    }
    if char_len(email) > EMAIL_MAX_LENGTH || !email_regex().is_match(email) {
        return Err(ValidationError::new("email", "email format is invalid"));
    }
    Ok(())
}

pub(crate) fn validate_display_name(display_name: &str) -> DomainResult<()> {
    if display_name.is_empty() {
        return Err(ValidationError::new("displayName", "display name is required"));
    }
    check_max_len(
        "displayName",
        display_name,
        DISPLAY_NAME_MAX_LENGTH,
        "display name must not exceed 64 characters",
    )
}

/// Length caps for the optional profile fields, checked in declaration order.
pub(crate) fn validate_profile_fields(
    bio: &str,
    location: &str,
    website: &str,
    twitter: &str,
    facebook: &str,
) -> DomainResult<()> {
    check_max_len("bio", bio, BIO_MAX_LENGTH, "bio must not exceed 500 characters")?;
    check_max_len(
        "location",
        location,
        LOCATION_MAX_LENGTH,
        "location must not exceed 100 characters",
    )?;
    check_max_len(
        "website",
        website,
        WEBSITE_MAX_LENGTH,
        "website URL must not exceed 255 characters",
    )?;
    check_max_len(
        "twitter",
        twitter,
        SOCIAL_ACCOUNT_MAX_LENGTH,
        "twitter handle must not exceed 50 characters",
    )?;
    check_max_len(
        "facebook",
        facebook,
        SOCIAL_ACCOUNT_MAX_LENGTH,
        "facebook handle must not exceed 50 characters",
    )
}

/// Lock expiry reached by `fail_count` failures at `at`, if any threshold is met.
pub fn lock_expiry_for(fail_count: i64, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    lock_minutes_for(fail_count).map(|minutes| at + Duration::minutes(minutes))
}

impl User {
    /// Create an active user with no login history
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        display_name: impl Into<String>,
        role: UserRole,
    ) -> Self {
        let now = now();
        User {
            id: ObjectId::new(),
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            display_name: display_name.into(),
            role,
            profile_image: String::new(),
            cover_image: String::new(),
            bio: String::new(),
            location: String::new(),
            website: String::new(),
            twitter: String::new(),
            facebook: String::new(),
            status: UserStatus::Active,
            login_fail_count: 0,
            locked_until: None,
            last_login_at: None,
            last_login_ip: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Check every create-time rule, reporting the first one violated
    pub fn validate_for_create(&self) -> DomainResult<()> {
        validate_username(&self.username)?;
        validate_email(&self.email)?;
        validate_display_name(&self.display_name)?;
        validate_profile_fields(
            &self.bio,
            &self.location,
            &self.website,
            &self.twitter,
            &self.facebook,
        )?;
        if self.login_fail_count < 0 {
            return Err(ValidationError::new(
                "loginFailCount",
                "login failure count cannot be negative",
            ));
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Locked by status, or by a lock expiry that has not yet passed at `at`
    pub fn is_locked_at(&self, at: DateTime<Utc>) -> bool {
        self.status == UserStatus::Locked || self.locked_until.is_some_and(|until| at < until)
    }

    pub fn is_locked(&self) -> bool {
        self.is_locked_at(Utc::now())
    }

    pub fn can_login(&self) -> bool {
        self.is_active() && !self.is_locked()
    }

    pub fn is_owner(&self) -> bool {
        self.role == UserRole::Owner
    }

    /// Owner or admin
    pub fn is_admin(&self) -> bool {
        self.role.includes(UserRole::Admin)
    }

    /// Owner, admin or editor
    pub fn is_editor(&self) -> bool {
        self.role.includes(UserRole::Editor)
    }

    pub fn can_manage_users(&self) -> bool {
        self.is_admin()
    }

    pub fn can_manage_all_posts(&self) -> bool {
        self.is_editor()
    }

    pub fn can_manage_comments(&self) -> bool {
        self.is_editor()
    }

    /// Stamp both timestamps for a fresh insert
    pub fn prepare_for_insert(&mut self) {
        let now = now();
        self.created_at = now;
        self.updated_at = now;
    }

    pub fn prepare_for_update(&mut self) {
        self.updated_at = now();
    }

    /// Record a failed login, locking the account once a threshold is crossed
    pub fn increment_login_fail_count(&mut self) {
        let now = now();
        self.login_fail_count += 1;
        self.updated_at = now;

        if let Some(until) = lock_expiry_for(self.login_fail_count, now) {
            self.locked_until = Some(until);
            self.status = UserStatus::Locked;
        }
    }

    /// Clear the failure counter and any lock; a locked account becomes active
    pub fn reset_login_fail_count(&mut self) {
        self.login_fail_count = 0;
        self.locked_until = None;
        if self.status == UserStatus::Locked {
            self.status = UserStatus::Active;
        }
        self.updated_at = now();
    }

    /// Record a successful login from `ip_address`
    pub fn update_last_login(&mut self, ip_address: impl Into<String>) {
        let now = now();
        self.last_login_at = Some(now);
        self.last_login_ip = ip_address.into();
        self.reset_login_fail_count();
        self.updated_at = now;
    }

    pub fn lock(&mut self, until: DateTime<Utc>) {
        self.status = UserStatus::Locked;
        self.locked_until = Some(until);
        self.updated_at = now();
    }

    /// Administrative unlock: active, counter cleared, no expiry
    pub fn unlock(&mut self) {
        self.status = UserStatus::Active;
        self.login_fail_count = 0;
        self.locked_until = None;
        self.updated_at = now();
    }

    /// Soft delete: the record stays, the account becomes inactive
    pub fn deactivate(&mut self) {
        self.status = UserStatus::Inactive;
        self.updated_at = now();
    }
}

impl Entity for User {
    type Id = ObjectId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User::new(
            "alice",
            "alice@example.com",
            "$2a$12$hash",
            "Alice",
            UserRole::Author,
        )
    }

    #[test]
    fn test_new_user_is_active_and_can_login() {
        let user = sample_user();
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.login_fail_count, 0);
        assert!(user.can_login());
        assert!(user.validate_for_create().is_ok());
    }

    #[test]
    fn test_validate_username_bounds() {
        let mut user = sample_user();
        user.username = "ab".to_string();
        assert_eq!(user.validate_for_create().unwrap_err().field, "username");

        user.username = "a".repeat(32);
        assert!(user.validate_for_create().is_ok());

        user.username = "a".repeat(33);
        assert_eq!(user.validate_for_create().unwrap_err().field, "username");

        user.username = String::new();
        let err = user.validate_for_create().unwrap_err();
        assert_eq!(err.message, "username is required");
    }

    #[test]
    fn test_validate_reports_first_violation() {
        let mut user = sample_user();
        user.email = "not-an-email".to_string();
        user.display_name = String::new();
        assert_eq!(user.validate_for_create().unwrap_err().field, "email");
    }

    #[test]
    fn test_validate_email_format() {
        assert!(validate_email("bob@example.co.uk").is_ok());
        assert!(validate_email("first.last+tag@sub.example.org").is_ok());
        assert!(validate_email("bob@").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("bob example.com").is_err());
        assert!(validate_email("bob@example").is_err());
    }

    #[test]
    fn test_validate_optional_caps_count_code_points() {
        let mut user = sample_user();
        user.bio = "字".repeat(500);
        assert!(user.validate_for_create().is_ok());

        user.bio = "字".repeat(501);
        assert_eq!(user.validate_for_create().unwrap_err().field, "bio");

        user.bio = String::new();
        user.twitter = "t".repeat(51);
        assert_eq!(user.validate_for_create().unwrap_err().field, "twitter");
    }

    #[test]
    fn test_lockout_thresholds() {
        let mut user = sample_user();
        user.increment_login_fail_count();
        user.increment_login_fail_count();
        assert!(!user.is_locked());
        assert_eq!(user.status, UserStatus::Active);

        user.increment_login_fail_count();
        assert!(user.is_locked());
        assert!(!user.can_login());
        let until = user.locked_until.unwrap();
        let expected = Utc::now() + Duration::minutes(15);
        assert!((until - expected).num_seconds().abs() <= 2);

        user.increment_login_fail_count();
        user.increment_login_fail_count();
        let until = user.locked_until.unwrap();
        let expected = Utc::now() + Duration::minutes(60);
        assert!((until - expected).num_seconds().abs() <= 2);

        for _ in 0..5 {
            user.increment_login_fail_count();
        }
        assert_eq!(user.login_fail_count, 10);
        let until = user.locked_until.unwrap();
        let expected = Utc::now() + Duration::minutes(1440);
        assert!((until - expected).num_seconds().abs() <= 2);
    }

    #[test]
    fn test_is_locked_by_expiry_even_when_active() {
        let mut user = sample_user();
        user.locked_until = Some(Utc::now() + Duration::minutes(5));
        assert_eq!(user.status, UserStatus::Active);
        assert!(user.is_locked());

        user.locked_until = Some(Utc::now() - Duration::minutes(5));
        assert!(!user.is_locked());
    }

    #[test]
    fn test_update_last_login_clears_lock() {
        let mut user = sample_user();
        user.login_fail_count = 7;
        user.status = UserStatus::Locked;
        user.locked_until = Some(Utc::now() + Duration::hours(1));

        user.update_last_login("203.0.113.5");

        assert_eq!(user.login_fail_count, 0);
        assert!(user.locked_until.is_none());
        assert_eq!(user.last_login_ip, "203.0.113.5");
        assert!(user.last_login_at.is_some());
        assert_eq!(user.status, UserStatus::Active);
    }

    #[test]
    fn test_reset_keeps_suspended_status() {
        let mut user = sample_user();
        user.status = UserStatus::Suspended;
        user.login_fail_count = 4;
        user.reset_login_fail_count();
        assert_eq!(user.status, UserStatus::Suspended);
        assert_eq!(user.login_fail_count, 0);
    }

    #[test]
    fn test_unlock_and_deactivate() {
        let mut user = sample_user();
        user.lock(Utc::now() + Duration::hours(2));
        assert!(user.is_locked());

        user.unlock();
        assert_eq!(user.status, UserStatus::Active);
        assert!(user.locked_until.is_none());
        assert!(user.can_login());

        user.deactivate();
        assert_eq!(user.status, UserStatus::Inactive);
        assert!(!user.can_login());
    }

    #[test]
    fn test_role_predicates() {
        let mut user = sample_user();
        assert!(!user.can_manage_users());
        assert!(!user.can_manage_all_posts());

        user.role = UserRole::Editor;
        assert!(user.can_manage_all_posts());
        assert!(user.can_manage_comments());
        assert!(!user.can_manage_users());

        user.role = UserRole::Admin;
        assert!(user.can_manage_users());
        assert!(user.is_admin());
        assert!(!user.is_owner());

        user.role = UserRole::Owner;
        assert!(user.is_owner() && user.is_admin() && user.is_editor());
    }

    #[test]
    fn test_document_shape() {
        let user = sample_user();
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["_id"], serde_json::json!(user.id.to_hex()));
        assert_eq!(value["displayName"], "Alice");
        assert_eq!(value["role"], "author");
        assert!(value["createdAt"].is_i64());
        assert!(value.get("lockedUntil").is_none());
        assert!(value.get("lastLoginIP").is_some());

        let back: User = serde_json::from_value(value).unwrap();
        assert_eq!(back, user);
    }
}
