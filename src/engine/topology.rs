//! Topology gate and the application registry seam.
//!
//! The exact meaning of an application's shape lives outside the core; the
//! gate only answers "is this descriptor structurally sane" and must pass
//! before the first instance for an application is created.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyNode {
    pub id: String,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyEdge {
    pub from: String,
    pub to: String,
}

/// Structural description of an application, as handed over by the
/// external registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyDescriptor {
    pub application_id: String,
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<TopologyEdge>,
}

impl TopologyDescriptor {
    /// Well-formedness check: at least one node, node ids unique, every
    /// edge endpoint names an existing node, no self-loops.
    pub fn validate(&self) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        let mut ids = HashSet::new();
        for node in &self.nodes {
            if node.id.is_empty() || !ids.insert(node.id.as_str()) {
                return false;
            }
        }
        self.edges.iter().all(|edge| {
            edge.from != edge.to
                && ids.contains(edge.from.as_str())
                && ids.contains(edge.to.as_str())
        })
    }

    /// A linear chain of nodes, useful for tests and the CLI.
    pub fn chain(application_id: impl Into<String>, node_ids: &[&str]) -> Self {
        let nodes = node_ids
            .iter()
            .map(|id| TopologyNode {
                id: (*id).to_string(),
                kind: "view".to_string(),
            })
            .collect();
        let edges = node_ids
            .windows(2)
            .map(|pair| TopologyEdge {
                from: pair[0].to_string(),
                to: pair[1].to_string(),
            })
            .collect();
        Self {
            application_id: application_id.into(),
            nodes,
            edges,
        }
    }
}

/// What the engine needs to know about applications. The real registry is
/// an external collaborator; tests and the CLI use `StaticRegistry`.
pub trait ApplicationRegistry: Send + Sync {
    fn application_exists(&self, application_id: &str) -> bool;

    fn topology(&self, application_id: &str) -> Option<TopologyDescriptor>;
}

/// In-memory registry with the same optional JSON persistence as the
/// stores.
pub struct StaticRegistry {
    inner: Mutex<HashMap<String, TopologyDescriptor>>,
    path: Option<PathBuf>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            path: None,
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let inner = if path.exists() {
            std::fs::read_to_string(&path)
                .ok()
                .and_then(|data| serde_json::from_str(&data).ok())
                .unwrap_or_default()
        } else {
            HashMap::new()
        };
        Self {
            inner: Mutex::new(inner),
            path: Some(path),
        }
    }

    pub fn save(&self) -> Result<(), EngineError> {
        if let Some(path) = &self.path {
            let json = {
                let inner = self.inner.lock().unwrap();
                serde_json::to_string_pretty(&*inner)?
            };
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    pub fn register(&self, descriptor: TopologyDescriptor) {
        self.inner
            .lock()
            .unwrap()
            .insert(descriptor.application_id.clone(), descriptor);
    }

    pub fn remove(&self, application_id: &str) -> Option<TopologyDescriptor> {
        self.inner.lock().unwrap().remove(application_id)
    }

    pub fn application_ids(&self) -> Vec<String> {
        self.inner.lock().unwrap().keys().cloned().collect()
    }
}

impl Default for StaticRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationRegistry for StaticRegistry {
    fn application_exists(&self, application_id: &str) -> bool {
        self.inner.lock().unwrap().contains_key(application_id)
    }

    fn topology(&self, application_id: &str) -> Option<TopologyDescriptor> {
        self.inner.lock().unwrap().get(application_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_topology_is_valid() {
        let topo = TopologyDescriptor::chain("app-1", &["home", "form", "done"]);
        assert!(topo.validate());
        assert_eq!(topo.edges.len(), 2);
    }

    #[test]
    fn test_empty_topology_is_invalid() {
        let topo = TopologyDescriptor {
            application_id: "app-1".into(),
            nodes: vec![],
            edges: vec![],
        };
        assert!(!topo.validate());
    }

    #[test]
    fn test_duplicate_node_ids_are_invalid() {
        let mut topo = TopologyDescriptor::chain("app-1", &["a", "b"]);
        topo.nodes.push(TopologyNode {
            id: "a".into(),
            kind: "view".into(),
        });
        assert!(!topo.validate());
    }

    #[test]
    fn test_dangling_edge_is_invalid() {
        let mut topo = TopologyDescriptor::chain("app-1", &["a", "b"]);
        topo.edges.push(TopologyEdge {
            from: "a".into(),
            to: "ghost".into(),
        });
        assert!(!topo.validate());
    }

    #[test]
    fn test_self_loop_is_invalid() {
        let mut topo = TopologyDescriptor::chain("app-1", &["a", "b"]);
        topo.edges.push(TopologyEdge {
            from: "b".into(),
            to: "b".into(),
        });
        assert!(!topo.validate());
    }

    #[test]
    fn test_registry_round_trip() {
        let registry = StaticRegistry::new();
        assert!(!registry.application_exists("app-1"));
        registry.register(TopologyDescriptor::chain("app-1", &["a"]));
        assert!(registry.application_exists("app-1"));
        assert_eq!(registry.topology("app-1").unwrap().nodes.len(), 1);
    }
}
