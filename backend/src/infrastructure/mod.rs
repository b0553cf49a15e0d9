// Infrastructure layer module
pub mod persistence;

pub use persistence::{SqliteCollection, SqliteDocumentStore};
