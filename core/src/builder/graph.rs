use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use super::node::BuildNode;

/// Serializable view of a pass's node graph, for diagnostics and tracing
/// consumers.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    pub root: u64,
    /// Every reachable node once, in discovery order.
    pub nodes: Vec<NodeSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub id: u64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instantiation_stack: Option<String>,
    pub directory: Option<PathBuf>,
    pub children: Vec<u64>,
    pub timing: TimingSnapshot,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TimingSnapshot {
    pub self_ms: f64,
    pub total_ms: f64,
}

impl GraphSnapshot {
    pub fn from_root(root: &Arc<BuildNode>) -> Self {
        let mut seen = HashSet::new();
        let mut stack = vec![root.clone()];
        let mut nodes = Vec::new();

        while let Some(node) = stack.pop() {
            if !seen.insert(node.id()) {
                continue;
            }
            let children = node.children();
            nodes.push(NodeSnapshot::of(&node, &children));
            stack.extend(children.into_iter().rev());
        }
        // Node ids are handed out at discovery time.
        nodes.sort_by_key(|n| n.id);

        Self {
            root: root.id(),
            nodes,
        }
    }

    pub fn get(&self, id: u64) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl NodeSnapshot {
    fn of(node: &BuildNode, children: &[Arc<BuildNode>]) -> Self {
        let timing = node
            .timing()
            .map(|t| TimingSnapshot {
                self_ms: t.self_time.as_secs_f64() * 1e3,
                total_ms: t.total.as_secs_f64() * 1e3,
            })
            .unwrap_or_default();
        Self {
            id: node.id(),
            description: node.description().to_string(),
            plugin_name: node.plugin_name().map(str::to_string),
            instantiation_stack: node.instantiation_stack().map(str::to_string),
            directory: node.directory().map(|d| d.to_path_buf()),
            children: children.iter().map(|c| c.id()).collect(),
            timing,
        }
    }
}
