pub mod login_audit_service;
pub mod maintenance_service;

pub use login_audit_service::{FailureOutcome, LoginAttempt, LoginAuditService};
pub use maintenance_service::{MaintenanceService, SweepReport};
