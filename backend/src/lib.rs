pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::RequestContext;
pub use config::{Config, ConfigError, LogFormat};
pub use infrastructure::SqliteDocumentStore;
