pub mod context;
pub mod dto;
pub mod repositories;
pub mod services;

pub use context::RequestContext;
pub use repositories::{
    LoginLogRepository, MutableRepository, PageRepository, Paginated, PostRepository, Repository,
    RepositoryError, RepositoryResult, UserRepository,
};
pub use services::{LoginAttempt, LoginAuditService, MaintenanceService, SweepReport};
