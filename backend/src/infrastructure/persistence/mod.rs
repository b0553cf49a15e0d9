mod schema;
mod sqlite_collection;

pub use schema::{create_collection_table, initialize_database, is_valid_identifier};
pub use sqlite_collection::{SqliteCollection, SqliteDocumentStore};
