/// Domain entities
pub mod login_log;
pub mod page;
pub mod post;
pub mod user;

pub use login_log::LoginLog;
pub use page::Page;
pub use post::Post;
pub use user::{lock_expiry_for, User};
