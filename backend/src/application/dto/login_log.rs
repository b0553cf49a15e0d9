use crate::domain::base::DomainResult;
use crate::domain::entities::LoginLog;
use crate::domain::value_objects::{
    parse_optional, LoginFailReason, LoginMethod, LoginStatus, ObjectId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginLogCreateRequest {
    pub user_id: Option<ObjectId>,
    pub username: String,
    pub login_method: String,
    pub ip_address: String,
    pub user_agent: String,
    pub status: String,
    pub fail_reason: String,
    pub session_id: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub device_type: String,
    pub browser: String,
    pub os: String,
}

/// Filter for login log listings. Empty strings mean "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginLogFilter {
    /// Hex id; an unparsable id is ignored
    pub user_id: String,
    /// Case-insensitive substring
    pub username: String,
    pub status: String,
    pub ip_address: String,
    /// Inclusive lower bound on the login instant
    pub start_time: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the login instant
    pub end_time: Option<DateTime<Utc>>,
    pub country: String,
    pub region: String,
    pub city: String,
    pub device_type: String,
    pub browser: String,
    pub os: String,
    pub page: i64,
    pub limit: i64,
    pub sort_by: String,
    pub sort_desc: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginLogListItem {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub username: String,
    pub login_method: LoginMethod,
    pub ip_address: String,
    pub status: LoginStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_reason: Option<LoginFailReason>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub country: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub city: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub device_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub browser: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub os: String,
    pub login_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logout_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
}

impl LoginLog {
    pub fn from_request(req: &LoginLogCreateRequest) -> DomainResult<LoginLog> {
        let login_method: LoginMethod = req.login_method.parse()?;
        let status: LoginStatus = req.status.parse()?;

        let mut log = LoginLog::new(
            req.username.clone(),
            login_method,
            req.ip_address.clone(),
            req.user_agent.clone(),
            status,
        );
        log.user_id = req.user_id;
        log.fail_reason = parse_optional(&req.fail_reason)?;
        log.session_id = req.session_id.clone();
        log.update_location(req.country.clone(), req.region.clone(), req.city.clone());
        log.update_device_info(req.device_type.clone(), req.browser.clone(), req.os.clone());
        Ok(log)
    }

    pub fn to_list_item(&self) -> LoginLogListItem {
        LoginLogListItem {
            id: self.id.to_hex(),
            user_id: self.user_id.map(|id| id.to_hex()),
            username: self.username.clone(),
            login_method: self.login_method,
            ip_address: self.ip_address.clone(),
            status: self.status,
            fail_reason: self.fail_reason,
            country: self.country.clone(),
            region: self.region.clone(),
            city: self.city.clone(),
            device_type: self.device_type.clone(),
            browser: self.browser.clone(),
            os: self.os.clone(),
            login_at: self.login_at,
            logout_at: self.logout_at,
            duration: self.duration,
        }
    }
}
