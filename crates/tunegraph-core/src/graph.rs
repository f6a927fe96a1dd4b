use crate::error::{Result, TunegraphError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub src: u32,
    pub dst: u32,
    pub weight: f64,
}

/// An incident edge as seen from one endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub node: u32,
    pub weight: f64,
}

/// Immutable undirected similarity graph in compressed sparse row form.
///
/// Neighbors of node `i` are `neighbors[offsets[i]..offsets[i + 1]]`. Every
/// edge `(u, v)` with `u != v` is stored under both endpoints; a self-loop is
/// stored once. Within a node, neighbors keep edge-list order.
#[derive(Debug, Default)]
pub struct SimilarityGraph {
    offsets: Vec<usize>,
    neighbors: Vec<Neighbor>,
    edges: Vec<Edge>,
}

impl SimilarityGraph {
    pub fn from_edges(node_count: u32, edges: Vec<Edge>) -> Result<Self> {
        let n = node_count as usize;
        let mut degree = vec![0usize; n];
        for e in &edges {
            if e.src >= node_count || e.dst >= node_count {
                return Err(TunegraphError::Validation(format!(
                    "edge ({}, {}) references a node outside 0..{node_count}",
                    e.src, e.dst
                )));
            }
            if !e.weight.is_finite() {
                return Err(TunegraphError::Validation(format!(
                    "edge ({}, {}) has non-finite weight {}",
                    e.src, e.dst, e.weight
                )));
            }
            degree[e.src as usize] += 1;
            if e.src != e.dst {
                degree[e.dst as usize] += 1;
            }
        }

        let mut offsets = Vec::with_capacity(n + 1);
        offsets.push(0);
        for d in &degree {
            let last = offsets[offsets.len() - 1];
            offsets.push(last + d);
        }

        let mut cursor: Vec<usize> = offsets[..n].to_vec();
        let mut neighbors = vec![
            Neighbor {
                node: 0,
                weight: 0.0,
            };
            offsets[n]
        ];
        for e in &edges {
            let s = e.src as usize;
            neighbors[cursor[s]] = Neighbor {
                node: e.dst,
                weight: e.weight,
            };
            cursor[s] += 1;
            if e.src != e.dst {
                let d = e.dst as usize;
                neighbors[cursor[d]] = Neighbor {
                    node: e.src,
                    weight: e.weight,
                };
                cursor[d] += 1;
            }
        }

        let graph = Self {
            offsets,
            neighbors,
            edges,
        };
        // parallel edges are summed at query time; the sum must stay finite too
        for node in 0..node_count {
            for (other, weight) in graph.merged_candidates(node)? {
                if !weight.is_finite() {
                    return Err(TunegraphError::Validation(format!(
                        "edges between {node} and {other} sum to non-finite weight"
                    )));
                }
            }
        }
        Ok(graph)
    }

    /// Every edge touching `index`, parallel edges and self-loops included.
    pub fn incident_edges(&self, index: u32) -> Result<&[Neighbor]> {
        let i = index as usize;
        if i >= self.node_count() as usize {
            return Err(TunegraphError::NotFound(format!(
                "node {index} (graph has {} nodes)",
                self.node_count()
            )));
        }
        Ok(&self.neighbors[self.offsets[i]..self.offsets[i + 1]])
    }

    /// Raw incident entry count: each parallel edge and self-loop counts.
    /// See [`candidate_count`](Self::candidate_count) for distinct neighbors.
    pub fn degree(&self, index: u32) -> Result<usize> {
        self.incident_edges(index).map(|n| n.len())
    }

    /// Number of distinct neighbors other than `index` itself.
    pub fn candidate_count(&self, index: u32) -> Result<usize> {
        self.merged_candidates(index).map(|m| m.len())
    }

    /// Incident edges with self-loops dropped and parallel edges summed.
    pub(crate) fn merged_candidates(&self, index: u32) -> Result<HashMap<u32, f64>> {
        let incident = self.incident_edges(index)?;
        let mut merged: HashMap<u32, f64> = HashMap::with_capacity(incident.len());
        for nb in incident.iter().filter(|nb| nb.node != index) {
            *merged.entry(nb.node).or_insert(0.0) += nb.weight;
        }
        Ok(merged)
    }

    pub fn node_count(&self) -> u32 {
        self.offsets.len().saturating_sub(1) as u32
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges in the order the graph was built from.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }
}
