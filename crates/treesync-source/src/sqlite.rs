//! SQLite-backed reader.
//!
//! rusqlite is synchronous, so every statement runs on the blocking pool.
//! Streaming queries push rows through a bounded channel: the worker
//! blocks while the consumer is busy, keeping memory flat on large tables.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;
use treesync_core::{Row, SourceValue};

use crate::error::{SourceError, SourceResult};
use crate::reader::{RelationalReader, RowStream};

/// Rows buffered between the blocking worker and the consumer.
const ROW_CHANNEL_CAPACITY: usize = 16;

#[derive(Clone)]
pub struct SqliteReader {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteReader {
    /// Open an existing database file read-only.
    pub fn open(path: &Path) -> SourceResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        debug!(path = %path.display(), "Opened SQLite source");
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> SourceResult<T>
    where
        F: FnOnce(&Connection) -> SourceResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&guard)
        })
        .await?
    }

    fn stream_rows(&self, sql: String, params: Vec<Value>) -> RowStream {
        let (tx, rx) = mpsc::channel(ROW_CHANNEL_CAPACITY);
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = send_rows(&guard, &sql, &params, &tx) {
                let _ = tx.blocking_send(Err(e));
            }
            // Release the connection before the consumer sees end-of-stream.
            drop(guard);
            drop(tx);
        });

        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed()
    }
}

fn send_rows(
    conn: &Connection,
    sql: &str,
    params: &[Value],
    tx: &mpsc::Sender<SourceResult<Row>>,
) -> SourceResult<()> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query(params_from_iter(params.iter()))?;

    while let Some(row) = rows.next()? {
        let converted = convert_row(row, &names)?;
        if tx.blocking_send(Ok(converted)).is_err() {
            // Consumer went away.
            break;
        }
    }
    Ok(())
}

fn convert_row(row: &rusqlite::Row<'_>, names: &[String]) -> SourceResult<Row> {
    let mut out = Row::new();
    for (idx, name) in names.iter().enumerate() {
        out.push(name.clone(), convert_value(row.get_ref(idx)?));
    }
    Ok(out)
}

fn convert_value(value: ValueRef<'_>) -> SourceValue {
    match value {
        ValueRef::Null => SourceValue::Null,
        ValueRef::Integer(i) => SourceValue::Integer(i),
        ValueRef::Real(f) => SourceValue::Float(f),
        ValueRef::Text(t) => SourceValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SourceValue::Text(String::from_utf8_lossy(b).into_owned()),
    }
}

fn to_sql_value(value: &SourceValue) -> Value {
    match value {
        SourceValue::Null => Value::Null,
        SourceValue::Bool(b) => Value::Integer(i64::from(*b)),
        SourceValue::Integer(i) => Value::Integer(*i),
        SourceValue::Float(f) => Value::Real(*f),
        SourceValue::Text(s) => Value::Text(s.clone()),
        SourceValue::Timestamp(ts) => Value::Text(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        SourceValue::Date(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
    }
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn select_list(columns: &[String]) -> String {
    if columns.is_empty() {
        "*".to_string()
    } else {
        columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[async_trait]
impl RelationalReader for SqliteReader {
    async fn columns(&self, table: &str) -> SourceResult<Vec<String>> {
        let sql = format!("SELECT * FROM {} LIMIT 0", quote_identifier(table));
        let table = table.to_string();
        self.with_conn(move |conn| {
            let stmt = conn
                .prepare(&sql)
                .map_err(|_| SourceError::TableNotFound(table))?;
            Ok(stmt.column_names().into_iter().map(String::from).collect())
        })
        .await
    }

    async fn query(&self, sql: &str) -> SourceResult<RowStream> {
        Ok(self.stream_rows(sql.to_string(), Vec::new()))
    }

    async fn scan_table(&self, table: &str, columns: &[String]) -> SourceResult<RowStream> {
        let sql = format!(
            "SELECT {} FROM {}",
            select_list(columns),
            quote_identifier(table)
        );
        Ok(self.stream_rows(sql, Vec::new()))
    }

    async fn query_by_key(
        &self,
        table: &str,
        key_field: &str,
        key: &SourceValue,
    ) -> SourceResult<Option<Row>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1 LIMIT 1",
            quote_identifier(table),
            quote_identifier(key_field)
        );
        let param = to_sql_value(key);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let mut rows = stmt.query([param])?;
            let found = match rows.next()? {
                Some(row) => Some(convert_row(row, &names)?),
                None => None,
            };
            Ok(found)
        })
        .await
    }

    async fn query_children(
        &self,
        table: &str,
        parent_link_field: &str,
        value: &SourceValue,
    ) -> SourceResult<RowStream> {
        if value.is_null() {
            return Err(SourceError::Read(format!(
                "null parent link for {}.{}",
                table, parent_link_field
            )));
        }
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1",
            quote_identifier(table),
            quote_identifier(parent_link_field)
        );
        Ok(self.stream_rows(sql, vec![to_sql_value(value)]))
    }
}
