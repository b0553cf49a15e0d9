// Domain layer module
pub mod base;
pub mod constants;
pub mod content;
pub mod entities;
pub mod value_objects;

pub use base::*;
pub use entities::*;
pub use value_objects::*;
