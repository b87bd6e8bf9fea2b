//! SQL migration definitions for the graphctx node graph.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: nodes, edges",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Content nodes. Timestamps are fixed-width RFC 3339 UTC, so text order is time order.
CREATE TABLE IF NOT EXISTS nodes (
    id           TEXT PRIMARY KEY,
    content      TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    timestamp    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_nodes_timestamp ON nodes(timestamp DESC, id);

-- Relationships. Traversal ignores direction.
CREATE TABLE IF NOT EXISTS edges (
    from_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    to_id   TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    kind    TEXT,
    PRIMARY KEY (from_id, to_id)
);

CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
    ]
}
