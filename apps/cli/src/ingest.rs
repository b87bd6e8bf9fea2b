//! Ingest documents: the JSON file format `graphctx ingest` loads.
//!
//! ```json
//! {
//!   "nodes": [{ "id": "b", "content": "Weather forecast", "timestamp": "2024-05-01T12:00:00Z" }],
//!   "edges": [{ "from": "b", "to": "c", "kind": "mentions" }]
//! }
//! ```
//!
//! `id` defaults to a fresh UUID v7 and `timestamp` to the ingest time. Edges
//! may only reference nodes declared in the same document.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use graphctx_shared::{GraphContextError, Node, Result};
use graphctx_storage::Edge;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct IngestDocument {
    #[serde(default)]
    pub nodes: Vec<IngestNode>,
    #[serde(default)]
    pub edges: Vec<IngestEdge>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct IngestNode {
    pub id: Option<String>,
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct IngestEdge {
    pub from: String,
    pub to: String,
    pub kind: Option<String>,
}

/// A validated document, ready to write.
#[derive(Debug)]
pub(crate) struct PreparedGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl PreparedGraph {
    /// Rows to write: one per node plus one per edge.
    pub fn len(&self) -> usize {
        self.nodes.len() + self.edges.len()
    }
}

/// Read and parse an ingest document from disk.
pub(crate) fn read_document(path: &Path) -> Result<IngestDocument> {
    let raw = std::fs::read_to_string(path).map_err(|e| GraphContextError::io(path, e))?;
    serde_json::from_str(&raw).map_err(|e| {
        GraphContextError::validation(format!("invalid ingest document {}: {e}", path.display()))
    })
}

/// Fill in defaults and check references.
pub(crate) fn prepare(document: IngestDocument, now: DateTime<Utc>) -> Result<PreparedGraph> {
    let mut seen = HashSet::new();
    let mut nodes = Vec::with_capacity(document.nodes.len());

    for node in document.nodes {
        let id = match node.id {
            Some(id) if id.trim().is_empty() => {
                return Err(GraphContextError::validation("node id must not be blank"));
            }
            Some(id) => id,
            None => Uuid::now_v7().to_string(),
        };
        if !seen.insert(id.clone()) {
            return Err(GraphContextError::validation(format!(
                "duplicate node id '{id}'"
            )));
        }
        nodes.push(Node::new(id, node.content, node.timestamp.unwrap_or(now)));
    }

    for edge in &document.edges {
        for endpoint in [&edge.from, &edge.to] {
            if !seen.contains(endpoint) {
                return Err(GraphContextError::validation(format!(
                    "edge {} -> {} references unknown node '{endpoint}'",
                    edge.from, edge.to
                )));
            }
        }
        if edge.from == edge.to {
            return Err(GraphContextError::validation(format!(
                "self-loop on node '{}'",
                edge.from
            )));
        }
    }

    let edges = document
        .edges
        .into_iter()
        .map(|edge| Edge {
            from: edge.from,
            to: edge.to,
            kind: edge.kind,
        })
        .collect();
    Ok(PreparedGraph { nodes, edges })
}
