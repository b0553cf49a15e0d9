/// Value objects for the domain layer
use super::base::{DomainResult, ValidationError, ValueObject};
use chrono::{DateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Write as _};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use thiserror::Error;

/// Reasons a string cannot be read as an [`ObjectId`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObjectIdError {
    #[error("id cannot be empty")]
    Empty,
    #[error("invalid id format")]
    InvalidFormat,
}

/// 12-byte document identifier: 4 bytes of big-endian creation seconds,
/// 5 bytes unique to this process, and a 3-byte rolling counter.
///
/// Rendered as 24 lowercase hex characters on the wire and in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

fn process_unique() -> &'static [u8; 5] {
    static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
    PROCESS_UNIQUE.get_or_init(|| {
        let random = uuid::Uuid::new_v4();
        let mut bytes = [0u8; 5];
        bytes.copy_from_slice(&random.as_bytes()[..5]);
        bytes
    })
}

fn next_counter() -> u32 {
    static COUNTER: OnceLock<AtomicU32> = OnceLock::new();
    let counter = COUNTER.get_or_init(|| {
        let seed = uuid::Uuid::new_v4().as_u128() as u32;
        AtomicU32::new(seed & 0x00FF_FFFF)
    });
    counter.fetch_add(1, Ordering::Relaxed) & 0x00FF_FFFF
}

impl ObjectId {
    /// Generate a fresh id stamped with the current time.
    pub fn new() -> Self {
        let seconds = Utc::now().timestamp() as u32;
        let counter = next_counter();

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(process_unique());
        bytes[9..].copy_from_slice(&counter.to_be_bytes()[1..]);
        ObjectId(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Parse a 24-character hex string.
    pub fn parse_str(value: &str) -> Result<Self, ObjectIdError> {
        if value.is_empty() {
            return Err(ObjectIdError::Empty);
        }
        if value.len() != 24 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ObjectIdError::InvalidFormat);
        }

        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&value[i * 2..i * 2 + 2], 16)
                .map_err(|_| ObjectIdError::InvalidFormat)?;
        }
        Ok(ObjectId(bytes))
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(24);
        for byte in self.0 {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }

    /// Creation instant embedded in the id (second precision).
    pub fn timestamp(&self) -> DateTime<Utc> {
        let mut seconds = [0u8; 4];
        seconds.copy_from_slice(&self.0[..4]);
        Utc.timestamp_opt(i64::from(u32::from_be_bytes(seconds)), 0)
            .single()
            .unwrap_or_default()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        ObjectId::new()
    }
}

impl ValueObject for ObjectId {}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = ObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse_str(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ObjectId::parse_str(&raw).map_err(de::Error::custom)
    }
}

/// Defines a closed string enumeration with a stable wire spelling.
///
/// Generates `ALL`, `as_str`, `Display`, and a `FromStr` that fails with a
/// `ValidationError` on the given field.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, field = $field:literal, message = $message:literal {
            $($variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl ValueObject for $name {}

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(ValidationError::new($field, $message)),
                }
            }
        }
    };
}

wire_enum! {
    /// Administrative role; each role carries every right of the roles below it.
    UserRole, field = "role", message = "invalid user role" {
        Owner => "owner",
        Admin => "admin",
        Editor => "editor",
        Author => "author",
    }
}

wire_enum! {
    UserStatus, field = "status", message = "invalid user status" {
        Active => "active",
        Inactive => "inactive",
        Locked => "locked",
        Suspended => "suspended",
    }
}

wire_enum! {
    /// Publication state shared by posts and pages.
    PostStatus, field = "status", message = "invalid post status" {
        Draft => "draft",
        Published => "published",
        Scheduled => "scheduled",
        Archived => "archived",
        Trash => "trash",
    }
}

wire_enum! {
    PostType, field = "type", message = "invalid post type" {
        Post => "post",
        Page => "page",
    }
}

wire_enum! {
    PostVisibility, field = "visibility", message = "invalid post visibility" {
        Public => "public",
        MembersOnly => "members_only",
        Private => "private",
    }
}

wire_enum! {
    LoginStatus, field = "status", message = "invalid login status" {
        Success => "success",
        Failed => "failed",
    }
}

wire_enum! {
    LoginFailReason, field = "failReason", message = "invalid login failure reason" {
        InvalidPassword => "invalid_password",
        UserNotFound => "user_not_found",
        UserLocked => "user_locked",
        UserInactive => "user_inactive",
        UserSuspended => "user_suspended",
        TooManyAttempts => "too_many_attempts",
    }
}

wire_enum! {
    LoginMethod, field = "loginMethod", message = "invalid login method" {
        Username => "username",
        Email => "email",
    }
}

impl UserRole {
    /// Rank in the hierarchy; higher ranks hold every lower right.
    fn rank(&self) -> u8 {
        match self {
            UserRole::Owner => 3,
            UserRole::Admin => 2,
            UserRole::Editor => 1,
            UserRole::Author => 0,
        }
    }

    pub fn includes(&self, other: UserRole) -> bool {
        self.rank() >= other.rank()
    }
}

/// A tag embedded in a post
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub slug: String,
}

impl Tag {
    /// Build a tag, deriving the slug from the name when `slug` is blank.
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        let name = name.into();
        let slug = slug.into();
        let slug = if slug.trim().is_empty() {
            super::content::generate_slug(&name)
        } else {
            slug
        };
        Tag { name, slug }
    }
}

impl ValueObject for Tag {}

/// Parse an optional wire string for an enum, treating blank as absent.
pub fn parse_optional<T>(value: &str) -> DomainResult<Option<T>>
where
    T: FromStr<Err = ValidationError>,
{
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some)
}
