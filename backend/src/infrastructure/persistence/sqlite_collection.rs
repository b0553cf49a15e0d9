use super::schema::{create_collection_table, initialize_database, is_valid_identifier};
use crate::application::context::RequestContext;
use crate::application::repositories::collection::{
    CollectionError, CollectionResult, Document, DocumentCollection,
};
use crate::application::repositories::query::{
    Condition, FindOptions, IndexDirection, IndexModel, Query, Sort, SortDirection, Update,
    UpdateResult,
};
use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, ErrorCode, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

fn backend_error(err: rusqlite::Error) -> CollectionError {
    CollectionError::Backend(err.to_string())
}

/// Duplicate-key failures carry the name of the violated index; a clash on
/// the primary key is reported as `_id_`.
fn classify_write_error(collection: &str, err: rusqlite::Error) -> CollectionError {
    if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
        if let rusqlite::Error::SqliteFailure(_, Some(message)) = &err {
            if message.starts_with("UNIQUE constraint failed") {
                let index = match message.split_once("index '") {
                    Some((_, rest)) => {
                        let name = rest.trim_end_matches('\'');
                        let prefix = format!("{collection}__");
                        name.strip_prefix(prefix.as_str()).unwrap_or(name).to_string()
                    }
                    None => "_id_".to_string(),
                };
                return CollectionError::DuplicateKey { index };
            }
        }
    }
    backend_error(err)
}

/// A SQLite database holding one table per collection.
///
/// Every document is a JSON object in a `doc` column keyed by its `_id`.
/// Clones share the same connection.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDocumentStore {
    pub fn open(path: impl AsRef<Path>) -> CollectionResult<Self> {
        let conn = Connection::open(path).map_err(backend_error)?;
        Self::from_connection(conn)
    }

    /// Create a new in-memory store (useful for testing)
    pub fn open_in_memory() -> CollectionResult<Self> {
        let conn = Connection::open_in_memory().map_err(backend_error)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> CollectionResult<Self> {
        initialize_database(&conn).map_err(backend_error)?;
        Ok(SqliteDocumentStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Handle on the collection `name`, creating its table on first use
    pub fn collection(&self, name: &str) -> CollectionResult<Arc<SqliteCollection>> {
        if !is_valid_identifier(name, false) {
            return Err(CollectionError::Backend(format!(
                "invalid collection name: {name}"
            )));
        }
        {
            let conn = self
                .conn
                .lock()
                .map_err(|_| CollectionError::Backend("connection lock poisoned".to_string()))?;
            create_collection_table(&conn, name).map_err(backend_error)?;
        }
        Ok(Arc::new(SqliteCollection {
            name: name.to_string(),
            conn: Arc::clone(&self.conn),
        }))
    }
}

/// SQL text plus its positional parameters
#[derive(Debug, Default, PartialEq)]
struct Statement {
    sql: String,
    params: Vec<SqlValue>,
}

fn json_path(field: &str) -> CollectionResult<String> {
    if !is_valid_identifier(field, true) {
        return Err(CollectionError::Backend(format!("invalid field name: {field}")));
    }
    Ok(format!("'$.{field}'"))
}

fn field_expr(source: &str, field: &str) -> CollectionResult<String> {
    Ok(format!("json_extract({source}, {})", json_path(field)?))
}

fn to_sql_value(value: &Value) -> CollectionResult<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(flag) => Ok(SqlValue::Integer(i64::from(*flag))),
        Value::Number(number) => match (number.as_i64(), number.as_f64()) {
            (Some(int), _) => Ok(SqlValue::Integer(int)),
            (None, Some(float)) => Ok(SqlValue::Real(float)),
            _ => Err(CollectionError::Encode(format!("unsupported number: {number}"))),
        },
        Value::String(text) => Ok(SqlValue::Text(text.clone())),
        other => Err(CollectionError::Encode(format!(
            "unsupported query value: {other}"
        ))),
    }
}

fn render_condition(
    expr: &str,
    condition: &Condition,
    params: &mut Vec<SqlValue>,
) -> CollectionResult<String> {
    let (op, value) = match condition {
        Condition::Eq(Value::Null) | Condition::Exists(false) => {
            return Ok(format!("{expr} IS NULL"));
        }
        Condition::Exists(true) => return Ok(format!("{expr} IS NOT NULL")),
        Condition::Regex {
            pattern,
            case_insensitive,
        } => {
            let pattern = if *case_insensitive {
                format!("(?i){pattern}")
            } else {
                pattern.clone()
            };
            params.push(SqlValue::Text(pattern));
            return Ok(format!("{expr} REGEXP ?"));
        }
        Condition::Eq(value) => ("=", value),
        Condition::Gt(value) => (">", value),
        Condition::Gte(value) => (">=", value),
        Condition::Lt(value) => ("<", value),
        Condition::Lte(value) => ("<=", value),
    };
    params.push(to_sql_value(value)?);
    Ok(format!("{expr} {op} ?"))
}

/// A dotted path matches when any element of the leading array field
/// satisfies the condition on the remaining path.
fn render_field(
    field: &str,
    condition: &Condition,
    params: &mut Vec<SqlValue>,
) -> CollectionResult<String> {
    match field.split_once('.') {
        None => render_condition(&field_expr("doc", field)?, condition, params),
        Some((array, path)) => {
            let source = format!("json_each(doc, {})", json_path(array)?);
            let element = field_expr("value", path)?;
            if *condition == Condition::Exists(false) {
                return Ok(format!(
                    "NOT EXISTS (SELECT 1 FROM {source} WHERE {element} IS NOT NULL)"
                ));
            }
            let inner = render_condition(&element, condition, params)?;
            Ok(format!("EXISTS (SELECT 1 FROM {source} WHERE {inner})"))
        }
    }
}

fn render_query(query: &Query, params: &mut Vec<SqlValue>) -> CollectionResult<String> {
    let mut clauses = Vec::with_capacity(query.conditions.len() + 1);
    for (field, condition) in &query.conditions {
        clauses.push(render_field(field, condition, params)?);
    }
    if !query.any_of.is_empty() {
        let mut alternatives = Vec::with_capacity(query.any_of.len());
        for alternative in &query.any_of {
            alternatives.push(format!("({})", render_query(alternative, params)?));
        }
        clauses.push(format!("({})", alternatives.join(" OR ")));
    }
    if clauses.is_empty() {
        Ok("1 = 1".to_string())
    } else {
        Ok(clauses.join(" AND "))
    }
}

fn render_sort(sort: &Sort) -> CollectionResult<String> {
    let mut keys = Vec::with_capacity(sort.keys.len() + 1);
    for (field, direction) in &sort.keys {
        let direction = match direction {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        };
        keys.push(format!("{} {direction}", field_expr("doc", field)?));
    }
    keys.push("rowid ASC".to_string());
    Ok(format!("ORDER BY {}", keys.join(", ")))
}

/// New document expression: sets, then increments, then removals
fn render_update(update: &Update, params: &mut Vec<SqlValue>) -> CollectionResult<String> {
    let mut expr = "doc".to_string();
    for (field, value) in &update.set {
        let json = serde_json::to_string(value).map_err(|e| CollectionError::Encode(e.to_string()))?;
        params.push(SqlValue::Text(json));
        expr = format!("json_set({expr}, {}, json(?))", json_path(field)?);
    }
    for (field, by) in &update.inc {
        params.push(SqlValue::Integer(*by));
        expr = format!(
            "json_set({expr}, {}, COALESCE({}, 0) + ?)",
            json_path(field)?,
            field_expr("doc", field)?
        );
    }
    for field in &update.unset {
        expr = format!("json_remove({expr}, {})", json_path(field)?);
    }
    Ok(expr)
}

fn parse_document(text: &str) -> CollectionResult<Document> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(other) => Err(CollectionError::Decode(format!(
            "stored value is not an object: {other}"
        ))),
        Err(e) => Err(CollectionError::Decode(e.to_string())),
    }
}

/// One collection of a [`SqliteDocumentStore`]
pub struct SqliteCollection {
    name: String,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCollection {
    /// Run `work` on the blocking pool under the context's cancellation and
    /// deadline. A statement already handed to SQLite runs to completion.
    async fn with_connection<T, F>(&self, ctx: &RequestContext, work: F) -> CollectionResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> CollectionResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        ctx.run(async move {
            let task = tokio::task::spawn_blocking(move || match conn.lock() {
                Ok(conn) => work(&conn),
                Err(_) => Err(CollectionError::Backend(
                    "connection lock poisoned".to_string(),
                )),
            });
            match task.await {
                Ok(result) => result,
                Err(e) => Err(CollectionError::Backend(format!("storage task failed: {e}"))),
            }
        })
        .await
    }

    fn select(&self, query: &Query, options: &FindOptions) -> CollectionResult<Statement> {
        let mut params = Vec::new();
        let filter = render_query(query, &mut params)?;
        let order = render_sort(&options.sort)?;
        params.push(SqlValue::Integer(
            options
                .limit
                .map(|limit| i64::try_from(limit).unwrap_or(i64::MAX))
                .unwrap_or(-1),
        ));
        params.push(SqlValue::Integer(
            i64::try_from(options.skip.unwrap_or(0)).unwrap_or(i64::MAX),
        ));
        Ok(Statement {
            sql: format!(
                "SELECT doc FROM \"{}\" WHERE {filter} {order} LIMIT ? OFFSET ?",
                self.name
            ),
            params,
        })
    }

    /// Update of the first matching document in insertion order
    fn update_statement(&self, query: &Query, update: &Update) -> CollectionResult<Statement> {
        let mut params = Vec::new();
        let expr = render_update(update, &mut params)?;
        let filter = render_query(query, &mut params)?;
        Ok(Statement {
            sql: format!(
                "UPDATE \"{name}\" SET doc = {expr} WHERE id = \
                 (SELECT id FROM \"{name}\" WHERE {filter} ORDER BY rowid LIMIT 1)",
                name = self.name
            ),
            params,
        })
    }

    fn index_statement(&self, index: &IndexModel) -> CollectionResult<Option<String>> {
        // Text and array-path indexes have no SQLite counterpart; those
        // lookups are served by scans.
        if index.is_text() || index.keys.iter().any(|(field, _)| field.contains('.')) {
            return Ok(None);
        }
        let mut columns = Vec::with_capacity(index.keys.len());
        for (field, direction) in &index.keys {
            let direction = if *direction == IndexDirection::Descending {
                "DESC"
            } else {
                "ASC"
            };
            columns.push(format!("{} {direction}", field_expr("doc", field)?));
        }
        Ok(Some(format!(
            "CREATE {unique}INDEX IF NOT EXISTS \"{name}__{index}\" ON \"{name}\" ({columns})",
            unique = if index.unique { "UNIQUE " } else { "" },
            name = self.name,
            index = index.name(),
            columns = columns.join(", ")
        )))
    }
}

#[async_trait]
impl DocumentCollection for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&self, ctx: &RequestContext, document: Document) -> CollectionResult<()> {
        let id = match document.get("_id") {
            Some(Value::String(id)) => id.clone(),
            _ => {
                return Err(CollectionError::Encode(
                    "document is missing a string _id".to_string(),
                ))
            }
        };
        let text = serde_json::to_string(&document)
            .map_err(|e| CollectionError::Encode(e.to_string()))?;
        let sql = format!("INSERT INTO \"{}\" (id, doc) VALUES (?1, ?2)", self.name);
        let name = self.name.clone();
        self.with_connection(ctx, move |conn| {
            conn.execute(&sql, rusqlite::params![id, text])
                .map_err(|e| classify_write_error(&name, e))?;
            Ok(())
        })
        .await
    }

    async fn find_one(
        &self,
        ctx: &RequestContext,
        query: &Query,
    ) -> CollectionResult<Option<Document>> {
        let options = FindOptions::default().with_limit(1);
        let mut documents = self.find(ctx, query, &options).await?;
        Ok(documents.pop())
    }

    async fn find(
        &self,
        ctx: &RequestContext,
        query: &Query,
        options: &FindOptions,
    ) -> CollectionResult<Vec<Document>> {
        let statement = self.select(query, options)?;
        self.with_connection(ctx, move |conn| {
            let mut stmt = conn.prepare(&statement.sql).map_err(backend_error)?;
            let rows = stmt
                .query_map(params_from_iter(statement.params.iter()), |row| {
                    row.get::<_, String>(0)
                })
                .map_err(backend_error)?;
            let mut documents = Vec::new();
            for row in rows {
                documents.push(parse_document(&row.map_err(backend_error)?)?);
            }
            Ok(documents)
        })
        .await
    }

    async fn count_documents(&self, ctx: &RequestContext, query: &Query) -> CollectionResult<u64> {
        let mut params = Vec::new();
        let filter = render_query(query, &mut params)?;
        let sql = format!("SELECT COUNT(*) FROM \"{}\" WHERE {filter}", self.name);
        self.with_connection(ctx, move |conn| {
            let count: i64 = conn
                .query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))
                .map_err(backend_error)?;
            Ok(count as u64)
        })
        .await
    }

    async fn update_one(
        &self,
        ctx: &RequestContext,
        query: &Query,
        update: &Update,
    ) -> CollectionResult<UpdateResult> {
        let statement = self.update_statement(query, update)?;
        let name = self.name.clone();
        self.with_connection(ctx, move |conn| {
            let changed = conn
                .execute(&statement.sql, params_from_iter(statement.params.iter()))
                .map_err(|e| classify_write_error(&name, e))?;
            Ok(UpdateResult {
                matched: changed as u64,
            })
        })
        .await
    }

    async fn find_one_and_update(
        &self,
        ctx: &RequestContext,
        query: &Query,
        update: &Update,
    ) -> CollectionResult<Option<Document>> {
        let mut statement = self.update_statement(query, update)?;
        statement.sql.push_str(" RETURNING doc");
        let name = self.name.clone();
        self.with_connection(ctx, move |conn| {
            let text: Option<String> = conn
                .query_row(&statement.sql, params_from_iter(statement.params.iter()), |row| {
                    row.get(0)
                })
                .optional()
                .map_err(|e| classify_write_error(&name, e))?;
            text.as_deref().map(parse_document).transpose()
        })
        .await
    }

    async fn create_indexes(
        &self,
        ctx: &RequestContext,
        indexes: &[IndexModel],
    ) -> CollectionResult<Vec<String>> {
        let mut names = Vec::with_capacity(indexes.len());
        let mut statements = Vec::new();
        for index in indexes {
            names.push(index.name());
            match self.index_statement(index)? {
                Some(sql) => statements.push(sql),
                None => tracing::debug!(
                    collection = %self.name,
                    index = %index.name(),
                    "index served by scans"
                ),
            }
        }
        self.with_connection(ctx, move |conn| {
            for sql in &statements {
                conn.execute(sql, []).map_err(backend_error)?;
            }
            Ok(())
        })
        .await?;
        Ok(names)
    }
}
