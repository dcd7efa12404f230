//! SQLite Record Store
//!
//! File-based persistent storage using SQLite. Filters compile to
//! parameterised SQL; identifiers are validated and double-quoted, values are
//! always bound.

use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::config::is_identifier;
use crate::domain::models::{Row, Value};
use crate::domain::ports::RecordStore;
use crate::domain::query::{Assignment, ComputedColumn, Direction, Filter, Mutation, Select};
use crate::{Result, StorageError};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Sql;
        Ok(ToSqlOutput::Owned(match self {
            Value::Null => Sql::Null,
            Value::Bool(b) => Sql::Integer(i64::from(*b)),
            Value::Integer(i) => Sql::Integer(*i),
            Value::Real(r) => Sql::Real(*r),
            Value::Text(s) => Sql::Text(s.clone()),
        }))
    }
}

/// Blobs are read as text; bytes that are not UTF-8 are an error rather than
/// being replaced
fn value_from_sql(column: &str, value: ValueRef<'_>) -> Result<Value> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|err| {
                StorageError::serialization(format!("Column {} is not valid UTF-8", column))
                    .with_source(err)
            })?;
            Value::Text(text.to_string())
        }
    })
}

fn quote(identifier: &str) -> Result<String> {
    if is_identifier(identifier) {
        Ok(format!("\"{}\"", identifier))
    } else {
        Err(StorageError::invalid_query(format!(
            "Invalid identifier: {:?}",
            identifier
        )))
    }
}

/// Compile a filter to a WHERE clause body, pushing bound values onto `params`
fn compile_filter(filter: &Filter, params: &mut Vec<Value>) -> Result<String> {
    Ok(match filter {
        Filter::All => "1 = 1".to_string(),
        Filter::Eq(c, v) => binary(c, "=", v, params)?,
        Filter::Lt(c, v) => binary(c, "<", v, params)?,
        Filter::Le(c, v) => binary(c, "<=", v, params)?,
        Filter::Gt(c, v) => binary(c, ">", v, params)?,
        Filter::Ge(c, v) => binary(c, ">=", v, params)?,
        Filter::In(_, values) if values.is_empty() => "0 = 1".to_string(),
        Filter::In(c, values) => {
            params.extend(values.iter().cloned());
            let placeholders = vec!["?"; values.len()].join(", ");
            format!("{} IN ({})", quote(c)?, placeholders)
        }
        Filter::IsNull(c) => format!("{} IS NULL", quote(c)?),
        Filter::And(filters) | Filter::Or(filters) if filters.is_empty() => {
            if matches!(filter, Filter::And(_)) {
                "1 = 1".to_string()
            } else {
                "0 = 1".to_string()
            }
        }
        Filter::And(filters) => join(filters, " AND ", params)?,
        Filter::Or(filters) => join(filters, " OR ", params)?,
    })
}

fn binary(column: &str, op: &str, value: &Value, params: &mut Vec<Value>) -> Result<String> {
    params.push(value.clone());
    Ok(format!("{} {} ?", quote(column)?, op))
}

fn join(filters: &[Filter], separator: &str, params: &mut Vec<Value>) -> Result<String> {
    let parts = filters
        .iter()
        .map(|f| compile_filter(f, params).map(|sql| format!("({})", sql)))
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(separator))
}

fn compile_assignments(assignments: &[Assignment], params: &mut Vec<Value>) -> Result<String> {
    if assignments.is_empty() {
        return Err(StorageError::invalid_query("UPDATE without assignments"));
    }
    let parts = assignments
        .iter()
        .map(|a| -> Result<String> {
            Ok(match a {
                Assignment::Set(c, v) => {
                    params.push(v.clone());
                    format!("{} = ?", quote(c)?)
                }
                Assignment::Increment(c, delta) => {
                    params.push(Value::Integer(*delta));
                    let c = quote(c)?;
                    format!("{} = {} + ?", c, c)
                }
                Assignment::Toggle(c) => {
                    let c = quote(c)?;
                    format!("{} = NOT {}", c, c)
                }
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(", "))
}

fn execute_mutation(conn: &Connection, table: &str, mutation: &Mutation) -> Result<usize> {
    match mutation {
        Mutation::Update {
            filter,
            assignments,
        } => execute_update(conn, table, filter, assignments),
        Mutation::Delete { filter } => execute_delete(conn, table, filter),
    }
}

fn execute_update(
    conn: &Connection,
    table: &str,
    filter: &Filter,
    assignments: &[Assignment],
) -> Result<usize> {
    let mut params = Vec::new();
    let set = compile_assignments(assignments, &mut params)?;
    let condition = compile_filter(filter, &mut params)?;
    let sql = format!("UPDATE {} SET {} WHERE {}", quote(table)?, set, condition);
    conn.execute(&sql, params_from_iter(params.iter()))
        .map_err(|e| table_error(table, e))
}

fn execute_delete(conn: &Connection, table: &str, filter: &Filter) -> Result<usize> {
    let mut params = Vec::new();
    let condition = compile_filter(filter, &mut params)?;
    let sql = format!("DELETE FROM {} WHERE {}", quote(table)?, condition);
    conn.execute(&sql, params_from_iter(params.iter()))
        .map_err(|e| table_error(table, e))
}

/// Map "no such table" to [`ErrorKind::UnknownTable`](crate::ErrorKind::UnknownTable)
fn table_error(table: &str, err: rusqlite::Error) -> StorageError {
    if err.to_string().contains("no such table") {
        StorageError::unknown_table(table).with_source(err)
    } else {
        StorageError::from(err)
    }
}

/// SQLite-based [`RecordStore`]
///
/// Tables are created by the caller ([`SqliteRecordStore::execute_schema`]);
/// the store only reads and writes rows.
#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Open (or create) a database file
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory SQLite store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a batch of DDL statements
    pub fn execute_schema(&self, sql: &str) -> Result<()> {
        let conn = self.conn.lock()?;
        conn.execute_batch(sql)?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn select(&self, table: &str, query: &Select) -> Result<Vec<Row>> {
        let mut params = Vec::new();
        let condition = compile_filter(&query.filter, &mut params)?;
        let mut sql = format!("SELECT * FROM {} WHERE {}", quote(table)?, condition);

        if !query.order.is_empty() {
            let order = query
                .order
                .iter()
                .map(|o| -> Result<String> {
                    let direction = match o.direction {
                        Direction::Asc => "ASC",
                        Direction::Desc => "DESC",
                    };
                    Ok(format!("{} {}", quote(&o.column)?, direction))
                })
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
        }

        match (query.limit, query.offset) {
            (None, None) => {}
            (limit, offset) => {
                // SQLite requires LIMIT before OFFSET; -1 = unbounded
                let limit = limit.map_or(-1, |l| l as i64);
                sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset.unwrap_or(0)));
            }
        }

        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(&sql).map_err(|e| table_error(table, e))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut cursor = stmt.query(params_from_iter(params.iter()))?;
        let mut rows = Vec::new();
        while let Some(row) = cursor.next()? {
            let mut record = Row::new();
            for (i, column) in columns.iter().enumerate() {
                record.insert(column.clone(), value_from_sql(column, row.get_ref(i)?)?);
            }
            rows.push(record);
        }
        Ok(rows)
    }

    async fn count(&self, table: &str, filter: &Filter) -> Result<usize> {
        let mut params = Vec::new();
        let condition = compile_filter(filter, &mut params)?;
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {}", quote(table)?, condition);

        let conn = self.conn.lock()?;
        let count: i64 = conn
            .query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))
            .map_err(|e| table_error(table, e))?;
        Ok(count as usize)
    }

    async fn max(&self, table: &str, column: &str, filter: Option<&Filter>) -> Result<Option<Value>> {
        let mut params = Vec::new();
        let condition = compile_filter(filter.unwrap_or(&Filter::All), &mut params)?;
        let sql = format!(
            "SELECT MAX({}) FROM {} WHERE {}",
            quote(column)?,
            quote(table)?,
            condition
        );

        let conn = self.conn.lock()?;
        let max: rusqlite::types::Value = conn
            .query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))
            .map_err(|e| table_error(table, e))?;
        let max = value_from_sql(column, ValueRef::from(&max))?;
        Ok(Some(max).filter(|v| !v.is_null()))
    }

    async fn insert(
        &self,
        table: &str,
        primary_key: &str,
        row: &Row,
        computed: Option<&ComputedColumn>,
    ) -> Result<Value> {
        let table_sql = quote(table)?;
        let mut columns = Vec::new();
        let mut values = Vec::new();
        let mut params = Vec::new();

        for (column, value) in row.iter() {
            if computed.is_some_and(|c| c.column() == column) {
                continue;
            }
            columns.push(quote(column)?);
            values.push("?".to_string());
            params.push(value.clone());
        }

        if let Some(ComputedColumn::NextInSequence(column)) = computed {
            let column = quote(column)?;
            values.push(format!(
                "(SELECT IFNULL(MAX(t.{}), 0) + 1 FROM {} AS t)",
                column, table_sql
            ));
            columns.push(column);
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table_sql)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table_sql,
                columns.join(", "),
                values.join(", ")
            )
        };

        let conn = self.conn.lock()?;
        conn.execute(&sql, params_from_iter(params.iter()))
            .map_err(|e| table_error(table, e))?;

        let key = match row.get(primary_key) {
            Some(key) if !key.is_null() => key.clone(),
            _ => Value::Integer(conn.last_insert_rowid()),
        };
        debug!(table, key = %key, "Inserted row");
        Ok(key)
    }

    async fn update(&self, table: &str, filter: &Filter, assignments: &[Assignment]) -> Result<usize> {
        let conn = self.conn.lock()?;
        execute_update(&conn, table, filter, assignments)
    }

    async fn delete_raw(&self, table: &str, filter: &Filter) -> Result<usize> {
        let conn = self.conn.lock()?;
        execute_delete(&conn, table, filter)
    }

    async fn transaction(&self, table: &str, mutations: &[Mutation]) -> Result<Vec<usize>> {
        let conn = self.conn.lock()?;
        let tx = conn.unchecked_transaction()?;

        let mut affected = Vec::with_capacity(mutations.len());
        for (i, mutation) in mutations.iter().enumerate() {
            // Dropping `tx` on the error path rolls back
            let n = execute_mutation(&tx, table, mutation).map_err(|err| {
                StorageError::transaction(format!(
                    "Statement {} of {} on {} failed, rolled back",
                    i + 1,
                    mutations.len(),
                    table
                ))
                .with_source(err)
            })?;
            affected.push(n);
        }

        tx.commit()?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::OrderBy;
    use crate::error::ErrorKind;

    fn store() -> SqliteRecordStore {
        let store = SqliteRecordStore::in_memory().unwrap();
        store
            .execute_schema(
                "CREATE TABLE items (
                    item_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT,
                    deleted INTEGER NOT NULL DEFAULT 0,
                    sort_order INTEGER
                )",
            )
            .unwrap();
        store
    }

    #[test]
    fn test_compile_filter() {
        let mut params = Vec::new();
        let sql = compile_filter(
            &Filter::eq("deleted", false).and(Filter::is_in(
                "item_id",
                vec![Value::Integer(1), Value::Integer(2)],
            )),
            &mut params,
        )
        .unwrap();
        assert_eq!(sql, "(\"deleted\" = ?) AND (\"item_id\" IN (?, ?))");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_compile_empty_in_and_or() {
        let mut params = Vec::new();
        assert_eq!(
            compile_filter(&Filter::is_in("a", Vec::new()), &mut params).unwrap(),
            "0 = 1"
        );
        assert_eq!(compile_filter(&Filter::Or(Vec::new()), &mut params).unwrap(), "0 = 1");
        assert_eq!(compile_filter(&Filter::And(Vec::new()), &mut params).unwrap(), "1 = 1");
    }

    #[test]
    fn test_rejects_injected_identifier() {
        let mut params = Vec::new();
        let err = compile_filter(&Filter::eq("a; DROP TABLE items", 1), &mut params).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidQuery);
    }

    #[tokio::test]
    async fn test_insert_with_sequence() {
        let store = store();
        let seq = ComputedColumn::NextInSequence("sort_order".into());
        for name in ["a", "b", "c"] {
            store
                .insert("items", "item_id", &Row::new().with("name", name), Some(&seq))
                .await
                .unwrap();
        }

        let rows = store
            .select("items", &Select::default().order_by(OrderBy::asc("sort_order")))
            .await
            .unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.get_str("name").unwrap()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(rows[2].get_i64("sort_order"), Some(3));
        assert_eq!(rows[2].get_i64("item_id"), Some(3));
    }

    #[tokio::test]
    async fn test_soft_flag_roundtrip_as_integer() {
        let store = store();
        let key = store
            .insert("items", "item_id", &Row::new().with("name", "a"), None)
            .await
            .unwrap();

        store
            .update("items", &Filter::eq("item_id", key.clone()), &[Assignment::toggle("deleted")])
            .await
            .unwrap();
        assert_eq!(store.count("items", &Filter::eq("deleted", true)).await.unwrap(), 1);
        assert_eq!(store.count("items", &Filter::eq("deleted", false)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let store = store();
        let err = store.count("missing", &Filter::All).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownTable);
    }

    #[tokio::test]
    async fn test_transaction_rolls_back() {
        let store = store();
        for name in ["a", "b"] {
            store
                .insert("items", "item_id", &Row::new().with("name", name), None)
                .await
                .unwrap();
        }

        let err = store
            .transaction(
                "items",
                &[
                    Mutation::delete(Filter::eq("item_id", 1)),
                    Mutation::update(Filter::All, vec![Assignment::set("no_such_column", 1)]),
                ],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transaction);
        assert_eq!(store.count("items", &Filter::All).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_blob_columns() {
        let store = store();
        store
            .execute_schema(
                "INSERT INTO items (name, sort_order) VALUES (CAST('plain' AS BLOB), 1);
                 INSERT INTO items (name, sort_order) VALUES (X'FF00FE', 2);",
            )
            .unwrap();

        let rows = store
            .select("items", &Select::new(Filter::eq("item_id", 1)))
            .await
            .unwrap();
        assert_eq!(rows[0].get_str("name"), Some("plain"));

        let err = store
            .select("items", &Select::new(Filter::eq("item_id", 2)))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Serialization);
        assert!(err.message.contains("name"));
    }

    #[tokio::test]
    async fn test_max_of_empty_table() {
        let store = store();
        assert_eq!(store.max("items", "sort_order", None).await.unwrap(), None);
    }
}
