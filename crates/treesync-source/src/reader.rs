//! Reader and connector seams.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use treesync_core::{Row, SourceValue};

use crate::error::SourceResult;

/// Lazily produced rows. Errors may surface mid-stream.
pub type RowStream = BoxStream<'static, SourceResult<Row>>;

/// Read-only access to one relational source.
#[async_trait]
pub trait RelationalReader: Send + Sync {
    /// Column names of a table, in declaration order.
    async fn columns(&self, table: &str) -> SourceResult<Vec<String>>;

    /// Run a raw SELECT and stream its rows.
    async fn query(&self, sql: &str) -> SourceResult<RowStream>;

    /// Stream the given columns of every row of a table; all columns when
    /// `columns` is empty.
    async fn scan_table(&self, table: &str, columns: &[String]) -> SourceResult<RowStream>;

    /// The first row whose `key_field` equals `key`, if any.
    async fn query_by_key(
        &self,
        table: &str,
        key_field: &str,
        key: &SourceValue,
    ) -> SourceResult<Option<Row>>;

    /// Every row whose `parent_link_field` equals `value`.
    async fn query_children(
        &self,
        table: &str,
        parent_link_field: &str,
        value: &SourceValue,
    ) -> SourceResult<RowStream>;
}

/// Opens readers for configured sources.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    async fn connect(&self, source_id: &str) -> SourceResult<Arc<dyn RelationalReader>>;
}
