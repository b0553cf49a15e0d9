/// Base abstractions for the domain layer
use chrono::{DateTime, SubsecRound, Utc};
use std::fmt::Debug;
use thiserror::Error;

/// Trait for value objects - immutable objects defined by their attributes
/// Value objects are equal if all their attributes are equal
pub trait ValueObject: Clone + PartialEq + Eq + Debug {}

/// Trait for entities - objects with identity that can change over time
/// Entities are equal if their IDs are equal, regardless of other attributes
pub trait Entity: Debug {
    type Id: ValueObject;

    fn id(&self) -> &Self::Id;
}

/// Result type for domain validation
pub type DomainResult<T> = Result<T, ValidationError>;

/// A violated domain rule, scoped to the field that broke it.
///
/// Validation stops at the first violated rule, so a single error is
/// reported per call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Current instant truncated to millisecond precision, the granularity
/// every persisted timestamp uses.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Number of Unicode code points in `value`.
pub(crate) fn char_len(value: &str) -> usize {
    value.chars().count()
}

/// Fails with `message` on `field` when `value` is longer than `max` code points.
pub(crate) fn check_max_len(
    field: &str,
    value: &str,
    max: usize,
    message: &str,
) -> DomainResult<()> {
    if char_len(value) > max {
        return Err(ValidationError::new(field, message));
    }
    Ok(())
}
