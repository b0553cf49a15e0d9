/// Records login attempts and drives the lockout transitions they cause
use crate::application::context::RequestContext;
use crate::application::repositories::{
    LoginLogRepository, Repository, RepositoryResult, UserRepository,
};
use crate::domain::entities::{LoginLog, User};
use crate::domain::value_objects::{LoginFailReason, LoginMethod};
use chrono::{DateTime, Utc};

/// Request-side facts about one login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttempt {
    pub username: String,
    pub login_method: LoginMethod,
    pub ip_address: String,
    pub user_agent: String,
}

impl LoginAttempt {
    pub fn new(
        username: impl Into<String>,
        login_method: LoginMethod,
        ip_address: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        LoginAttempt {
            username: username.into(),
            login_method,
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
        }
    }

    fn to_failed_log(&self, reason: LoginFailReason) -> LoginLog {
        LoginLog::failed(
            self.username.clone(),
            self.login_method,
            self.ip_address.clone(),
            self.user_agent.clone(),
            reason,
        )
    }
}

/// Result of recording a failed attempt
#[derive(Debug, Clone, PartialEq)]
pub struct FailureOutcome {
    pub log: LoginLog,
    /// Failures counted so far for a known user
    pub fail_count: Option<i64>,
    /// Set when this failure locked the account
    pub locked_until: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct LoginAuditService {
    users: UserRepository,
    logs: LoginLogRepository,
}

impl LoginAuditService {
    pub fn new(users: UserRepository, logs: LoginLogRepository) -> Self {
        LoginAuditService { users, logs }
    }

    /// Reset the user's lockout state and write a success log
    pub async fn record_success(
        &self,
        ctx: &RequestContext,
        user: &User,
        attempt: &LoginAttempt,
        session_id: &str,
    ) -> RepositoryResult<LoginLog> {
        let mut log = LoginLog::success(
            user.id,
            attempt.username.clone(),
            attempt.login_method,
            attempt.ip_address.clone(),
            attempt.user_agent.clone(),
            session_id,
        );
        log.validate_for_create()?;

        self.users
            .update_login_info(ctx, &user.id.to_hex(), &attempt.ip_address)
            .await?;
        self.logs.create(ctx, &mut log).await?;
        Ok(log)
    }

    /// Write a failure log. A wrong password for a known user also counts
    /// towards the lockout thresholds; other reasons leave the counter alone.
    pub async fn record_failure(
        &self,
        ctx: &RequestContext,
        user: Option<&User>,
        attempt: &LoginAttempt,
        reason: LoginFailReason,
    ) -> RepositoryResult<FailureOutcome> {
        let mut log = attempt.to_failed_log(reason);
        log.user_id = user.map(|user| user.id);
        log.validate_for_create()?;

        let mut fail_count = None;
        let mut locked_until = None;
        if let (Some(user), LoginFailReason::InvalidPassword) = (user, reason) {
            let was_locked = user.is_locked();
            let updated = self
                .users
                .increment_login_fail_count(ctx, &user.id.to_hex())
                .await?;
            fail_count = Some(updated.login_fail_count);
            if !was_locked && updated.is_locked() {
                locked_until = updated.locked_until;
            }
        }

        self.logs.create(ctx, &mut log).await?;
        Ok(FailureOutcome {
            log,
            fail_count,
            locked_until,
        })
    }
}
