// src/dag/graph.rs

use std::collections::HashMap;
use std::hash::Hash;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::trace;

use crate::errors::{BuildError, Result};

/// A node in a directed acyclic graph, described by its direct predecessors.
///
/// Implementors only need to say who they depend on; ordering and cycle
/// detection are provided by [`topological_sort`]. Two values with the same
/// [`Dag::key`] are the same node.
pub trait Dag: Clone {
    type Key: Copy + Eq + Hash;

    /// Identity of this node within a graph.
    fn key(&self) -> Self::Key;

    /// Direct predecessors: nodes that must come before this one.
    fn predecessors(&self) -> Vec<Self>;

    /// Human-readable name used in diagnostics.
    fn label(&self) -> String;
}

/// Order the transitive predecessor closure of `root`, predecessors first.
///
/// Every node in the closure appears exactly once and `root` is last.
/// A cycle anywhere in the closure fails with [`BuildError::DagCycle`]; the
/// traversal itself never loops because nodes are visited once by key.
pub fn topological_sort<N: Dag>(root: &N) -> Result<Vec<N>> {
    // Edge direction: predecessor -> node.
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let mut index: HashMap<N::Key, NodeIndex> = HashMap::new();
    let mut nodes: Vec<N> = Vec::new();

    let root_ix = graph.add_node(0);
    index.insert(root.key(), root_ix);
    nodes.push(root.clone());

    let mut stack: Vec<(N, NodeIndex)> = vec![(root.clone(), root_ix)];

    while let Some((node, node_ix)) = stack.pop() {
        for pred in node.predecessors() {
            let pred_ix = match index.get(&pred.key()) {
                Some(ix) => *ix,
                None => {
                    let ix = graph.add_node(nodes.len());
                    index.insert(pred.key(), ix);
                    nodes.push(pred.clone());
                    stack.push((pred, ix));
                    ix
                }
            };
            graph.update_edge(pred_ix, node_ix, ());
        }
    }

    trace!(nodes = nodes.len(), edges = graph.edge_count(), "sorting dependency closure");

    match toposort(&graph, None) {
        Ok(order) => Ok(order
            .into_iter()
            .map(|ix| nodes[graph[ix]].clone())
            .collect()),
        Err(cycle) => {
            let node = &nodes[graph[cycle.node_id()]];
            Err(BuildError::DagCycle(format!(
                "cycle detected in task graph involving '{}'",
                node.label()
            )))
        }
    }
}
