//! Neo4j-backed [`GraphWriter`].

use async_trait::async_trait;
use neo4rs::Txn;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use treesync_core::MutationOp;

use crate::client::{GraphClient, GraphConfig, GraphCounts};
use crate::cypher;
use crate::error::{GraphError, GraphResult};
use crate::schema::constraint_statement;
use crate::writer::{GraphTransaction, GraphWriter};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Writer that connects on first use, so a server can start while Neo4j is
/// still coming up.
pub struct Neo4jWriter {
    config: GraphConfig,
    client: OnceCell<GraphClient>,
}

impl Neo4jWriter {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> GraphResult<&GraphClient> {
        self.client
            .get_or_try_init(|| async {
                let client = tokio::time::timeout(CONNECT_TIMEOUT, GraphClient::connect(&self.config))
                    .await
                    .map_err(|_| {
                        GraphError::Connection(format!(
                            "no answer from {} within {}s",
                            self.config.uri,
                            CONNECT_TIMEOUT.as_secs()
                        ))
                    })?
                    .map_err(|e| GraphError::Connection(format!("{:#}", e)))?;
                info!(uri = %self.config.uri, "Connected to Neo4j");
                Ok(client)
            })
            .await
    }

    pub async fn counts(&self) -> GraphResult<GraphCounts> {
        self.client()
            .await?
            .totals()
            .await
            .map_err(|e| GraphError::Statement(format!("{:#}", e)))
    }
}

#[async_trait]
impl GraphWriter for Neo4jWriter {
    async fn check(&self) -> GraphResult<()> {
        self.client()
            .await?
            .execute("RETURN 1")
            .await
            .map_err(|e| GraphError::Connection(format!("{:#}", e)))
    }

    async fn ensure_constraint(&self, label: &str, property: &str) -> GraphResult<()> {
        let statement = constraint_statement(label, property);
        debug!(%statement, "Ensuring constraint");
        self.client()
            .await?
            .execute(&statement)
            .await
            .map_err(|e| GraphError::Statement(format!("{:#}", e)))
    }

    async fn begin(&self) -> GraphResult<Box<dyn GraphTransaction>> {
        let txn = self
            .client()
            .await?
            .start_txn()
            .await
            .map_err(|e| GraphError::Transaction(format!("{:#}", e)))?;
        Ok(Box::new(Neo4jTransaction { txn }))
    }
}

struct Neo4jTransaction {
    txn: Txn,
}

#[async_trait]
impl GraphTransaction for Neo4jTransaction {
    async fn run(&mut self, op: &MutationOp) -> GraphResult<()> {
        self.txn.run(cypher::to_query(op)).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> GraphResult<()> {
        self.txn
            .commit()
            .await
            .map_err(|e| GraphError::Transaction(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> GraphResult<()> {
        self.txn
            .rollback()
            .await
            .map_err(|e| GraphError::Transaction(e.to_string()))
    }
}
