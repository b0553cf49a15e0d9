use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Result};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Collection and field names end up in SQL text, so only plain identifiers
/// (optionally dotted, for field paths) are accepted.
pub fn is_valid_identifier(name: &str, allow_dots: bool) -> bool {
    static PLAIN: OnceLock<Regex> = OnceLock::new();
    static DOTTED: OnceLock<Regex> = OnceLock::new();
    let re = if allow_dots {
        DOTTED.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").unwrap())
    } else {
        PLAIN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
    };
    re.is_match(name)
}

/// Register the `REGEXP` operator. `X REGEXP Y` calls `regexp(Y, X)`; the
/// compiled pattern is cached per statement. Non-text values never match.
pub fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let re: Arc<Regex> = ctx.get_or_create_aux(0, |pattern| -> std::result::Result<_, BoxError> {
                Ok(Regex::new(pattern.as_str()?)?)
            })?;
            let is_match = match ctx.get_raw(1) {
                ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                    .map(|text| re.is_match(text))
                    .unwrap_or(false),
                _ => false,
            };
            Ok(is_match)
        },
    )
}

/// Prepare a fresh connection: busy timeout and functions.
/// Idempotent and safe to call on every open.
pub fn initialize_database(conn: &Connection) -> Result<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    register_functions(conn)
}

/// Create the backing table of one collection; idempotent
pub fn create_collection_table(conn: &Connection, name: &str) -> Result<()> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS \"{name}\" (
                id TEXT PRIMARY KEY,
                doc TEXT NOT NULL
            )"
        ),
        [],
    )?;
    Ok(())
}
