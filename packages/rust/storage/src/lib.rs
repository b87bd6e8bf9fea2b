//! Context stores: where the retrieval engine reads its node graph from.
//!
//! The engine depends only on the [`ContextStore`] trait: a recency-ordered
//! page of nodes, and a bounded undirected expansion around one node. Two
//! implementations ship here:
//!
//! - [`LibsqlStore`]: embedded libSQL database with versioned migrations.
//! - [`MemoryStore`]: in-process graph, for tests and embedding.
//!
//! **Access rules for [`LibsqlStore`]:**
//! - ingest: read-write via [`LibsqlStore::open`]
//! - retrieval: read-only via [`LibsqlStore::open_readonly`]

mod memory;
mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use graphctx_shared::{GraphContextError, Node, Result};
use libsql::{Connection, Database, params};
use tracing::{debug, warn};

pub use memory::MemoryStore;

/// A relationship to write. Direction is stored but ignored by traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub kind: Option<String>,
}

/// Read-only access to a graph of content nodes.
///
/// Implementations report failures as [`GraphContextError::Store`]; an empty
/// result is never an error.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Up to `limit` nodes, newest first, skipping the `offset` newest.
    /// An empty page means the store is exhausted.
    async fn fetch_recent(&self, offset: usize, limit: usize) -> Result<Vec<Node>>;

    /// Distinct nodes within `depth` undirected hops of `anchor_id`,
    /// excluding the anchor itself.
    async fn expand(&self, anchor_id: &str, depth: u32) -> Result<Vec<Node>>;
}

/// Node graph backed by an embedded libSQL database.
pub struct LibsqlStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl LibsqlStore {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GraphContextError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(GraphContextError::store)?;
        let conn = db.connect().map_err(GraphContextError::store)?;

        let store = Self {
            db,
            conn,
            readonly: false,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GraphContextError::store(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(GraphContextError::store)?;
        let conn = db.connect().map_err(GraphContextError::store)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        GraphContextError::store(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(GraphContextError::store(
                "database is opened in read-only mode",
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Write operations (ingest)
    // -----------------------------------------------------------------------

    /// Insert a node, or replace its content and timestamp if the id exists.
    pub async fn upsert_node(&self, node: &Node) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO nodes (id, content, content_hash, timestamp)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                   content = excluded.content,
                   content_hash = excluded.content_hash,
                   timestamp = excluded.timestamp",
                params![
                    node.id.as_str(),
                    node.content.as_str(),
                    node.content_hash(),
                    format_timestamp(&node.timestamp),
                ],
            )
            .await
            .map_err(GraphContextError::store)?;
        Ok(())
    }

    /// Link two existing nodes. Duplicate edges are ignored.
    pub async fn insert_edge(&self, from_id: &str, to_id: &str, kind: Option<&str>) -> Result<()> {
        self.check_writable()?;
        if from_id == to_id {
            return Err(GraphContextError::validation(format!(
                "self-loop on node '{from_id}'"
            )));
        }
        self.conn
            .execute(
                "INSERT OR IGNORE INTO edges (from_id, to_id, kind) VALUES (?1, ?2, ?3)",
                params![from_id, to_id, kind],
            )
            .await
            .map_err(GraphContextError::store)?;
        Ok(())
    }

    /// Write `nodes`, then `edges`, in one transaction. If any row fails the
    /// whole batch is rolled back. `on_row` runs after each written row.
    pub async fn ingest<F>(&self, nodes: &[Node], edges: &[Edge], mut on_row: F) -> Result<()>
    where
        F: FnMut(),
    {
        self.check_writable()?;
        self.conn
            .execute("BEGIN", params![])
            .await
            .map_err(GraphContextError::store)?;

        match self.write_rows(nodes, edges, &mut on_row).await {
            Ok(()) => {
                self.conn
                    .execute("COMMIT", params![])
                    .await
                    .map_err(GraphContextError::store)?;
                debug!(nodes = nodes.len(), edges = edges.len(), "ingest committed");
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute("ROLLBACK", params![]).await {
                    warn!(error = %rollback, "ingest rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn write_rows<F>(&self, nodes: &[Node], edges: &[Edge], on_row: &mut F) -> Result<()>
    where
        F: FnMut(),
    {
        for node in nodes {
            self.upsert_node(node).await?;
            on_row();
        }
        for edge in edges {
            self.insert_edge(&edge.from, &edge.to, edge.kind.as_deref())
                .await?;
            on_row();
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Read operations
    // -----------------------------------------------------------------------

    /// Fetch one node by id.
    pub async fn get_node(&self, id: &str) -> Result<Option<Node>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, content, timestamp FROM nodes WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(GraphContextError::store)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_node(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(GraphContextError::store(e)),
        }
    }

    /// Number of stored nodes.
    pub async fn node_count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM nodes", params![])
            .await
            .map_err(GraphContextError::store)?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count = row.get::<i64>(0).map_err(GraphContextError::store)?;
                Ok(u64::try_from(count).unwrap_or(0))
            }
            Ok(None) => Ok(0),
            Err(e) => Err(GraphContextError::store(e)),
        }
    }

    async fn collect_nodes(&self, mut rows: libsql::Rows) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        while let Some(row) = rows.next().await.map_err(GraphContextError::store)? {
            nodes.push(row_to_node(&row)?);
        }
        Ok(nodes)
    }
}

#[async_trait]
impl ContextStore for LibsqlStore {
    async fn fetch_recent(&self, offset: usize, limit: usize) -> Result<Vec<Node>> {
        let rows = self
            .conn
            .query(
                "SELECT id, content, timestamp FROM nodes
                 ORDER BY timestamp DESC, id
                 LIMIT ?1 OFFSET ?2",
                params![limit as i64, offset as i64],
            )
            .await
            .map_err(GraphContextError::store)?;

        let nodes = self.collect_nodes(rows).await?;
        debug!(offset, limit, fetched = nodes.len(), "fetched recent nodes");
        Ok(nodes)
    }

    async fn expand(&self, anchor_id: &str, depth: u32) -> Result<Vec<Node>> {
        let rows = self
            .conn
            .query(
                "WITH RECURSIVE reach(id, depth) AS (
                     SELECT ?1, 0
                     UNION
                     SELECT CASE WHEN e.from_id = r.id THEN e.to_id ELSE e.from_id END,
                            r.depth + 1
                     FROM reach r
                     JOIN edges e ON e.from_id = r.id OR e.to_id = r.id
                     WHERE r.depth < ?2
                 )
                 SELECT n.id, n.content, n.timestamp FROM nodes n
                 WHERE n.id IN (SELECT id FROM reach) AND n.id <> ?1
                 ORDER BY n.timestamp DESC, n.id",
                params![anchor_id, i64::from(depth)],
            )
            .await
            .map_err(GraphContextError::store)?;

        let nodes = self.collect_nodes(rows).await?;
        debug!(anchor_id, depth, related = nodes.len(), "expanded anchor");
        Ok(nodes)
    }
}

/// Fixed-width RFC 3339 so lexical order matches chronological order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_node(row: &libsql::Row) -> Result<Node> {
    let timestamp: String = row.get(2).map_err(GraphContextError::store)?;
    Ok(Node {
        id: row.get::<String>(0).map_err(GraphContextError::store)?,
        content: row.get::<String>(1).map_err(GraphContextError::store)?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| GraphContextError::store(format!("invalid timestamp '{timestamp}': {e}")))?,
    })
}
