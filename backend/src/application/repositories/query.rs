/// Backend-neutral query, sort, update and index descriptions
use chrono::{DateTime, Utc};
use serde_json::Value;

/// A predicate on a single field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    Regex {
        pattern: String,
        case_insensitive: bool,
    },
    Exists(bool),
}

/// Conjunction of field conditions, optionally AND-ed with one disjunction.
///
/// Field paths may be dotted (`tags.slug`); such a path matches when any
/// element of the array field carries the sub-field value. An empty query
/// matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub conditions: Vec<(String, Condition)>,
    pub any_of: Vec<Query>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.push(field, condition);
        self
    }

    pub fn push(&mut self, field: impl Into<String>, condition: Condition) {
        self.conditions.push((field.into(), condition));
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Eq(value.into()))
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Gt(value.into()))
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Gte(value.into()))
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Lt(value.into()))
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Lte(value.into()))
    }

    pub fn exists(self, field: impl Into<String>, present: bool) -> Self {
        self.with(field, Condition::Exists(present))
    }

    /// Case-insensitive literal substring match
    pub fn contains_ignore_case(self, field: impl Into<String>, needle: &str) -> Self {
        self.with(
            field,
            Condition::Regex {
                pattern: regex::escape(needle),
                case_insensitive: true,
            },
        )
    }

    /// Replace the disjunction with `queries`
    pub fn any_of(mut self, queries: Vec<Query>) -> Self {
        self.any_of = queries;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.any_of.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.condition(field).is_some()
    }

    /// First condition on `field`
    pub fn condition(&self, field: &str) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, condition)| condition)
    }
}

/// Instants are stored as integer milliseconds since the Unix epoch
pub fn millis(instant: DateTime<Utc>) -> Value {
    Value::from(instant.timestamp_millis())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn from_desc(desc: bool) -> Self {
        if desc {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        }
    }
}

/// Ordered sort keys; ties fall back to insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort {
    pub keys: Vec<(String, SortDirection)>,
}

impl Sort {
    pub fn by(field: impl Into<String>, direction: SortDirection) -> Self {
        Sort {
            keys: vec![(field.into(), direction)],
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::by(field, SortDirection::Descending)
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::by(field, SortDirection::Ascending)
    }

    pub fn then(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push((field.into(), direction));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Field-level modifications applied atomically to one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub set: Vec<(String, Value)>,
    pub unset: Vec<String>,
    pub inc: Vec<(String, i64)>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push((field.into(), value.into()));
        self
    }

    /// `set` when `value` is present
    pub fn set_some<V: Into<Value>>(self, field: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.set(field, value),
            None => self,
        }
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.unset.push(field.into());
        self
    }

    pub fn inc(mut self, field: impl Into<String>, by: i64) -> Self {
        self.inc.push((field.into(), by));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty() && self.inc.is_empty()
    }

    pub fn sets(&self, field: &str) -> bool {
        self.set.iter().any(|(name, _)| name == field)
    }

    pub fn set_value(&self, field: &str) -> Option<&Value> {
        self.set
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub sort: Sort,
}

impl FindOptions {
    pub fn sorted(sort: Sort) -> Self {
        FindOptions {
            sort,
            ..Self::default()
        }
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexDirection {
    Ascending,
    Descending,
    Text,
}

impl IndexDirection {
    fn suffix(&self) -> &'static str {
        match self {
            IndexDirection::Ascending => "1",
            IndexDirection::Descending => "-1",
            IndexDirection::Text => "text",
        }
    }
}

/// An index over one or more fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexModel {
    pub keys: Vec<(String, IndexDirection)>,
    pub unique: bool,
}

impl IndexModel {
    pub fn asc(field: impl Into<String>) -> Self {
        IndexModel {
            keys: vec![(field.into(), IndexDirection::Ascending)],
            unique: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        IndexModel {
            keys: vec![(field.into(), IndexDirection::Descending)],
            unique: false,
        }
    }

    pub fn text(fields: &[&str]) -> Self {
        IndexModel {
            keys: fields
                .iter()
                .map(|field| (field.to_string(), IndexDirection::Text))
                .collect(),
            unique: false,
        }
    }

    pub fn then_asc(mut self, field: impl Into<String>) -> Self {
        self.keys.push((field.into(), IndexDirection::Ascending));
        self
    }

    pub fn then_desc(mut self, field: impl Into<String>) -> Self {
        self.keys.push((field.into(), IndexDirection::Descending));
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn is_text(&self) -> bool {
        self.keys
            .iter()
            .any(|(_, direction)| *direction == IndexDirection::Text)
    }

    /// `field_1_other_-1` style name
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, direction)| format!("{}_{}", field, direction.suffix()))
            .collect::<Vec<_>>()
            .join("_")
    }
}
