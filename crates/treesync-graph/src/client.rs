//! Neo4j connection client.

use anyhow::{Context, Result};
use neo4rs::{ConfigBuilder, Graph, Query, Txn};
use treesync_core::GraphSettings;

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl From<&GraphSettings> for GraphConfig {
    fn from(settings: &GraphSettings) -> Self {
        Self {
            uri: settings.uri.clone(),
            user: settings.user.clone(),
            password: settings.password.clone(),
            database: settings.database.clone(),
        }
    }
}

/// Connection pool handle used by [`crate::Neo4jWriter`].
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

const TOTALS: &str = "MATCH (n) WITH count(n) AS nodes \
     OPTIONAL MATCH ()-[r]->() \
     RETURN nodes, count(r) AS relationships";

impl GraphClient {
    /// neo4rs builds its pool lazily, so `Graph::connect` alone does not
    /// touch the server. The `RETURN 1` ping forces the bolt handshake and
    /// lets callers put a timeout around the whole call.
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let neo4j_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .db(config.database.as_str())
            .max_connections(4)
            .fetch_size(200)
            .build()
            .context("Failed to build Neo4j config")?;

        let graph = Graph::connect(neo4j_config)
            .await
            .with_context(|| format!("Failed to create Neo4j pool for {}", config.uri))?;

        let client = Self { graph };
        client
            .execute("RETURN 1")
            .await
            .context("Neo4j is not responding to queries")?;
        Ok(client)
    }

    /// Run one parameterless statement outside a batch, e.g. DDL.
    pub async fn execute(&self, statement: &str) -> Result<()> {
        self.graph
            .run(Query::new(statement.to_string()))
            .await
            .with_context(|| format!("Neo4j statement failed: {}", statement))
    }

    pub async fn start_txn(&self) -> Result<Txn> {
        self.graph
            .start_txn()
            .await
            .context("Failed to open Neo4j transaction")
    }

    /// Node and relationship totals, shown after a CLI sync.
    pub async fn totals(&self) -> Result<GraphCounts> {
        let mut rows = self
            .graph
            .execute(Query::new(TOTALS.to_string()))
            .await
            .context("Neo4j totals query failed")?;
        let Some(row) = rows.next().await.context("Failed to read Neo4j row")? else {
            return Ok(GraphCounts::default());
        };
        let nodes: i64 = row
            .get("nodes")
            .map_err(|e| anyhow::anyhow!("Missing 'nodes' in totals: {:?}", e))?;
        let relationships: i64 = row
            .get("relationships")
            .map_err(|e| anyhow::anyhow!("Missing 'relationships' in totals: {:?}", e))?;
        Ok(GraphCounts {
            nodes: nodes.max(0) as usize,
            relationships: relationships.max(0) as usize,
        })
    }
}

/// Node and relationship counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphCounts {
    pub nodes: usize,
    pub relationships: usize,
}
