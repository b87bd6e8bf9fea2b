//! In-process node graph.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use graphctx_shared::{GraphContextError, Node, Result};
use parking_lot::RwLock;

use crate::ContextStore;

#[derive(Default)]
struct Graph {
    nodes: HashMap<String, Node>,
    adjacency: HashMap<String, BTreeSet<String>>,
}

/// Node graph held in memory behind a read-write lock.
#[derive(Default)]
pub struct MemoryStore {
    graph: RwLock<Graph>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node.
    pub fn add_node(&self, node: Node) {
        let mut graph = self.graph.write();
        graph.nodes.insert(node.id.clone(), node);
    }

    /// Link two existing nodes. Direction is not recorded.
    pub fn link(&self, a: &str, b: &str) -> Result<()> {
        if a == b {
            return Err(GraphContextError::validation(format!(
                "self-loop on node '{a}'"
            )));
        }
        let mut graph = self.graph.write();
        for id in [a, b] {
            if !graph.nodes.contains_key(id) {
                return Err(GraphContextError::validation(format!(
                    "unknown node '{id}'"
                )));
            }
        }
        graph
            .adjacency
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string());
        graph
            .adjacency
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.graph.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ContextStore for MemoryStore {
    async fn fetch_recent(&self, offset: usize, limit: usize) -> Result<Vec<Node>> {
        let graph = self.graph.read();
        let mut nodes: Vec<&Node> = graph.nodes.values().collect();
        nodes.sort_by(|a, b| newest_first(a, b));
        Ok(nodes.into_iter().skip(offset).take(limit).cloned().collect())
    }

    async fn expand(&self, anchor_id: &str, depth: u32) -> Result<Vec<Node>> {
        let graph = self.graph.read();
        let mut seen: HashSet<&str> = HashSet::from([anchor_id]);
        let mut queue: VecDeque<(&str, u32)> = VecDeque::from([(anchor_id, 0)]);
        let mut related = Vec::new();

        while let Some((id, hops)) = queue.pop_front() {
            if hops == depth {
                continue;
            }
            let Some(neighbours) = graph.adjacency.get(id) else {
                continue;
            };
            for next in neighbours {
                if seen.insert(next.as_str()) {
                    if let Some(node) = graph.nodes.get(next) {
                        related.push(node.clone());
                    }
                    queue.push_back((next.as_str(), hops + 1));
                }
            }
        }

        related.sort_by(newest_first);
        Ok(related)
    }
}

/// Store order: newest first, ties by id.
fn newest_first(a: &Node, b: &Node) -> std::cmp::Ordering {
    b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn store_with(ids: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        for (i, id) in ids.iter().enumerate() {
            store.add_node(Node::new(*id, format!("content {id}"), base + Duration::minutes(i as i64)));
        }
        store
    }

    fn sorted_ids(nodes: &[Node]) -> Vec<String> {
        let mut ids: Vec<_> = nodes.iter().map(|n| n.id.clone()).collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn fetch_recent_orders_newest_first() {
        let store = store_with(&["a", "b", "c"]);
        let page = store.fetch_recent(0, 2).await.unwrap();
        let ids: Vec<_> = page.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["c", "b"]);
        let rest = store.fetch_recent(2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert!(store.fetch_recent(3, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn equal_timestamps_tie_break_by_id() {
        let store = MemoryStore::new();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        store.add_node(Node::new("b", "x", ts));
        store.add_node(Node::new("a", "y", ts));
        let page = store.fetch_recent(0, 10).await.unwrap();
        assert_eq!(page[0].id, "a");
        assert_eq!(page[1].id, "b");
    }

    #[tokio::test]
    async fn expand_respects_depth_and_direction() {
        let store = store_with(&["a", "b", "c", "d"]);
        store.link("a", "b").unwrap();
        store.link("c", "b").unwrap();
        store.link("c", "d").unwrap();

        assert_eq!(sorted_ids(&store.expand("b", 1).await.unwrap()), ["a", "c"]);
        assert_eq!(
            sorted_ids(&store.expand("b", 2).await.unwrap()),
            ["a", "c", "d"]
        );
        assert_eq!(sorted_ids(&store.expand("d", 1).await.unwrap()), ["c"]);
    }

    #[tokio::test]
    async fn expand_dedupes_and_excludes_anchor() {
        let store = store_with(&["a", "b", "c"]);
        store.link("a", "b").unwrap();
        store.link("b", "c").unwrap();
        store.link("a", "c").unwrap();

        let related = store.expand("a", 2).await.unwrap();
        assert_eq!(sorted_ids(&related), ["b", "c"]);
    }

    #[tokio::test]
    async fn expand_returns_newest_first() {
        let store = store_with(&["a", "b", "c", "d"]);
        store.link("a", "b").unwrap();
        store.link("a", "d").unwrap();
        store.link("b", "c").unwrap();

        let related = store.expand("a", 2).await.unwrap();
        let ids: Vec<_> = related.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["d", "c", "b"]);
    }

    #[tokio::test]
    async fn expand_isolated_or_unknown_is_empty() {
        let store = store_with(&["a"]);
        assert!(store.expand("a", 2).await.unwrap().is_empty());
        assert!(store.expand("zzz", 2).await.unwrap().is_empty());
    }

    #[test]
    fn link_validates_endpoints() {
        let store = store_with(&["a", "b"]);
        assert!(store.link("a", "a").is_err());
        assert!(store.link("a", "missing").is_err());
        assert!(store.link("a", "b").is_ok());
        assert_eq!(store.len(), 2);
        assert!(!store.is_empty());
    }
}
