//! In-memory reader for tests and fixtures.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use treesync_core::{Row, SourceValue};

use crate::error::{SourceError, SourceResult};
use crate::reader::{RelationalReader, RowStream, SourceConnector};

/// Tables held as row vectors. Raw queries only answer SQL text that was
/// registered with [`MemoryReader::with_query`].
#[derive(Debug, Default, Clone)]
pub struct MemoryReader {
    tables: HashMap<String, Vec<Row>>,
    queries: HashMap<String, Vec<Row>>,
    failing_keys: HashSet<String>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        self.tables.insert(name.into(), rows);
        self
    }

    pub fn with_query(mut self, sql: impl Into<String>, rows: Vec<Row>) -> Self {
        self.queries.insert(sql.into(), rows);
        self
    }

    /// Make lookups and child queries for `key` fail with a read error.
    pub fn fail_on_key(mut self, key: impl Into<String>) -> Self {
        self.failing_keys.insert(key.into());
        self
    }

    fn table(&self, name: &str) -> SourceResult<&Vec<Row>> {
        self.tables
            .get(name)
            .or_else(|| {
                self.tables
                    .iter()
                    .find(|(t, _)| t.eq_ignore_ascii_case(name))
                    .map(|(_, rows)| rows)
            })
            .ok_or_else(|| SourceError::TableNotFound(name.to_string()))
    }

    fn check_key(&self, key: &SourceValue) -> SourceResult<Option<String>> {
        let key = key.as_key();
        if let Some(k) = &key {
            if self.failing_keys.contains(k) {
                return Err(SourceError::Read(format!("injected failure for key {}", k)));
            }
        }
        Ok(key)
    }
}

fn into_stream(rows: Vec<Row>) -> RowStream {
    stream::iter(rows.into_iter().map(Ok)).boxed()
}

#[async_trait]
impl RelationalReader for MemoryReader {
    /// Columns seen across the table's rows, first-seen order. An empty
    /// table reports none.
    async fn columns(&self, table: &str) -> SourceResult<Vec<String>> {
        let mut columns: Vec<String> = Vec::new();
        for row in self.table(table)? {
            for (name, _) in row.columns() {
                if !columns.iter().any(|c| c.eq_ignore_ascii_case(name)) {
                    columns.push(name.to_string());
                }
            }
        }
        Ok(columns)
    }

    async fn query(&self, sql: &str) -> SourceResult<RowStream> {
        self.queries
            .get(sql)
            .cloned()
            .map(into_stream)
            .ok_or_else(|| SourceError::Unsupported(sql.to_string()))
    }

    async fn scan_table(&self, table: &str, columns: &[String]) -> SourceResult<RowStream> {
        let rows = self.table(table)?;
        let projected = if columns.is_empty() {
            rows.clone()
        } else {
            rows.iter()
                .map(|row| {
                    columns
                        .iter()
                        .map(|c| (c.clone(), row.value(c).clone()))
                        .collect()
                })
                .collect()
        };
        Ok(into_stream(projected))
    }

    async fn query_by_key(
        &self,
        table: &str,
        key_field: &str,
        key: &SourceValue,
    ) -> SourceResult<Option<Row>> {
        let Some(key) = self.check_key(key)? else {
            return Ok(None);
        };
        Ok(self
            .table(table)?
            .iter()
            .find(|row| row.key(key_field).as_deref() == Some(key.as_str()))
            .cloned())
    }

    async fn query_children(
        &self,
        table: &str,
        parent_link_field: &str,
        value: &SourceValue,
    ) -> SourceResult<RowStream> {
        let Some(parent) = self.check_key(value)? else {
            return Err(SourceError::Read(format!(
                "null parent link for {}.{}",
                table, parent_link_field
            )));
        };
        let rows = self
            .table(table)?
            .iter()
            .filter(|row| row.key(parent_link_field).as_deref() == Some(parent.as_str()))
            .cloned()
            .collect();
        Ok(into_stream(rows))
    }
}

/// Connector over a fixed set of in-memory readers.
#[derive(Default, Clone)]
pub struct MemoryConnector {
    readers: HashMap<String, Arc<MemoryReader>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source_id: impl Into<String>, reader: MemoryReader) -> Self {
        self.readers.insert(source_id.into(), Arc::new(reader));
        self
    }
}

#[async_trait]
impl SourceConnector for MemoryConnector {
    async fn connect(&self, source_id: &str) -> SourceResult<Arc<dyn RelationalReader>> {
        match self.readers.get(source_id) {
            Some(reader) => Ok(Arc::clone(reader) as Arc<dyn RelationalReader>),
            None => Err(SourceError::UnknownSource(source_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn reader() -> MemoryReader {
        MemoryReader::new().with_table(
            "DEVICES",
            vec![
                Row::new().with("CODE", "D1").with("ID", 1).with("PARENT_ID", SourceValue::Null),
                Row::new().with("CODE", "D1a ").with("ID", 2).with("PARENT_ID", 1),
                Row::new().with("CODE", "D1b").with("ID", 3).with("PARENT_ID", 1),
            ],
        )
    }

    #[tokio::test]
    async fn test_lookup_trims_padded_keys() {
        let row = reader()
            .query_by_key("DEVICES", "CODE", &SourceValue::from("D1a"))
            .await
            .unwrap();
        assert_eq!(row.unwrap().value("ID"), &SourceValue::Integer(2));
    }

    #[tokio::test]
    async fn test_children_match_integer_links() {
        let rows: Vec<Row> = reader()
            .query_children("DEVICES", "PARENT_ID", &SourceValue::Integer(1))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure_and_unknown_table() {
        let reader = reader().fail_on_key("D1b");
        let err = reader
            .query_by_key("DEVICES", "CODE", &SourceValue::from("D1b"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Read(_)));
        assert!(reader.scan_table("NOPE", &[]).await.is_err());
        assert!(reader.query("SELECT 1").await.is_err());
    }

    #[tokio::test]
    async fn test_columns_union_rows() {
        let reader = reader().with_table(
            "EXTRA",
            vec![Row::new().with("A", 1), Row::new().with("a", 2).with("B", 3)],
        );
        assert_eq!(reader.columns("devices").await.unwrap(), vec!["CODE", "ID", "PARENT_ID"]);
        assert_eq!(reader.columns("EXTRA").await.unwrap(), vec!["A", "B"]);
        assert!(reader.columns("NOPE").await.is_err());
    }

    #[tokio::test]
    async fn test_connector_rejects_unknown_source() {
        let connector = MemoryConnector::new().with_source("a", reader());
        assert!(connector.connect("a").await.is_ok());
        assert!(matches!(
            connector.connect("b").await,
            Err(SourceError::UnknownSource(_))
        ));
    }
}
