pub mod base;
pub mod collection;
pub mod login_log_repository;
pub mod page_repository;
pub mod post_repository;
pub mod publishing;
pub mod query;
pub mod user_repository;

pub use base::{
    CollectionRepository, MutableRepository, Paginated, Pagination, Repository, RepositoryError,
    RepositoryResult, StoredEntity,
};
pub use collection::{CollectionError, CollectionResult, Document, DocumentCollection};
pub use login_log_repository::LoginLogRepository;
pub use page_repository::PageRepository;
pub use post_repository::PostRepository;
pub use query::{Condition, FindOptions, IndexModel, Query, Sort, SortDirection, Update};
pub use user_repository::UserRepository;
