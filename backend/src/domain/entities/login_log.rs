/// Login audit record; insert-only
use crate::domain::base::{check_max_len, now, DomainResult, Entity, ValidationError};
use crate::domain::constants::*;
use crate::domain::value_objects::{LoginFailReason, LoginMethod, LoginStatus, ObjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginLog {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// Absent when the username did not resolve to a user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<ObjectId>,
    /// As typed at the login prompt
    pub username: String,
    pub login_method: LoginMethod,
    pub ip_address: String,
    pub user_agent: String,
    pub status: LoginStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_reason: Option<LoginFailReason>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub login_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub logout_at: Option<DateTime<Utc>>,
    /// Session length in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub country: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub city: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub device_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub browser: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub os: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl LoginLog {
    pub fn new(
        username: impl Into<String>,
        login_method: LoginMethod,
        ip_address: impl Into<String>,
        user_agent: impl Into<String>,
        status: LoginStatus,
    ) -> Self {
        let now = now();
        LoginLog {
            id: ObjectId::new(),
            user_id: None,
            username: username.into(),
            login_method,
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
            status,
            fail_reason: None,
            session_id: String::new(),
            login_at: now,
            logout_at: None,
            duration: None,
            country: String::new(),
            region: String::new(),
            city: String::new(),
            device_type: String::new(),
            browser: String::new(),
            os: String::new(),
            created_at: now,
        }
    }

    pub fn success(
        user_id: ObjectId,
        username: impl Into<String>,
        login_method: LoginMethod,
        ip_address: impl Into<String>,
        user_agent: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        let mut log = LoginLog::new(
            username,
            login_method,
            ip_address,
            user_agent,
            LoginStatus::Success,
        );
        log.user_id = Some(user_id);
        log.session_id = session_id.into();
        log
    }

    pub fn failed(
        username: impl Into<String>,
        login_method: LoginMethod,
        ip_address: impl Into<String>,
        user_agent: impl Into<String>,
        reason: LoginFailReason,
    ) -> Self {
        let mut log = LoginLog::new(
            username,
            login_method,
            ip_address,
            user_agent,
            LoginStatus::Failed,
        );
        log.fail_reason = Some(reason);
        log
    }

    pub fn validate_for_create(&self) -> DomainResult<()> {
        if self.username.is_empty() {
            return Err(ValidationError::new("username", "username is required"));
        }
        if self.ip_address.is_empty() {
            return Err(ValidationError::new("ipAddress", "ip address is required"));
        }
        if self.user_agent.is_empty() {
            return Err(ValidationError::new("userAgent", "user agent is required"));
        }
        match self.status {
            LoginStatus::Failed if self.fail_reason.is_none() => {
                return Err(ValidationError::new(
                    "failReason",
                    "a failed login requires a failure reason",
                ));
            }
            LoginStatus::Success if self.user_id.is_none() => {
                return Err(ValidationError::new(
                    "userId",
                    "a successful login requires a user id",
                ));
            }
            _ => {}
        }

        check_max_len(
            "username",
            &self.username,
            LOGIN_USERNAME_MAX_LENGTH,
            "username must not exceed 64 characters",
        )?;
        if self.ip_address.len() > IP_ADDRESS_MAX_LENGTH
            || self.ip_address.parse::<IpAddr>().is_err()
        {
            return Err(ValidationError::new("ipAddress", "ip address format is invalid"));
        }
        check_max_len(
            "userAgent",
            &self.user_agent,
            USER_AGENT_MAX_LENGTH,
            "user agent must not exceed 512 characters",
        )?;
        for (field, value) in [
            ("country", &self.country),
            ("region", &self.region),
            ("city", &self.city),
        ] {
            check_max_len(
                field,
                value,
                GEO_FIELD_MAX_LENGTH,
                &format!("{field} must not exceed 100 characters"),
            )?;
        }
        Ok(())
    }

    pub fn is_success(&self) -> bool {
        self.status == LoginStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status == LoginStatus::Failed
    }

    /// Successful and not yet logged out
    pub fn is_active_session(&self) -> bool {
        self.is_success() && self.logout_at.is_none()
    }

    /// Session length in seconds: the recorded duration, the logout gap, or
    /// the time elapsed so far for a live session
    pub fn session_duration(&self) -> i64 {
        if let Some(duration) = self.duration {
            return duration;
        }
        if let Some(logout_at) = self.logout_at {
            return (logout_at - self.login_at).num_seconds();
        }
        if self.is_active_session() {
            return (Utc::now() - self.login_at).num_seconds();
        }
        0
    }

    /// Fill id-independent defaults for a fresh insert
    pub fn prepare_for_insert(&mut self) {
        self.created_at = now();
    }

    /// Close the session now and record its duration
    pub fn mark_logout(&mut self) {
        let now = now();
        self.logout_at = Some(now);
        self.duration = Some((now - self.login_at).num_seconds());
    }

    pub fn update_location(
        &mut self,
        country: impl Into<String>,
        region: impl Into<String>,
        city: impl Into<String>,
    ) {
        self.country = country.into();
        self.region = region.into();
        self.city = city.into();
    }

    pub fn update_device_info(
        &mut self,
        device_type: impl Into<String>,
        browser: impl Into<String>,
        os: impl Into<String>,
    ) {
        self.device_type = device_type.into();
        self.browser = browser.into();
        self.os = os.into();
    }
}

impl Entity for LoginLog {
    type Id = ObjectId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
