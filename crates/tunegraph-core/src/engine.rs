use crate::catalog::Catalog;
use crate::error::{Result, TunegraphError};
use crate::graph::{Neighbor, SimilarityGraph};
use serde::{Deserialize, Serialize};

/// One ranked neighbor, resolved back to display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub display_name: String,
    pub external_id: String,
    pub index: u32,
    pub weight: f64,
}

/// The loaded catalog/graph pair. Built once, then shared read-only
/// (typically as `Arc<Recommender>`) by every request.
#[derive(Debug)]
pub struct Recommender {
    catalog: Catalog,
    graph: SimilarityGraph,
}

impl Recommender {
    pub fn new(catalog: Catalog, graph: SimilarityGraph) -> Result<Self> {
        if graph.node_count() as usize != catalog.len() {
            return Err(TunegraphError::Validation(format!(
                "graph has {} nodes but catalog has {} tracks",
                graph.node_count(),
                catalog.len()
            )));
        }
        Ok(Self { catalog, graph })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn graph(&self) -> &SimilarityGraph {
        &self.graph
    }

    /// Top `n` neighbors of `index`, heaviest first.
    ///
    /// Self-loops are dropped and parallel edges to the same neighbor are
    /// summed into one candidate. Equal weights order by ascending neighbor
    /// index, so the output does not depend on edge storage order.
    pub fn recommend(&self, index: u32, n: usize) -> Result<Vec<Neighbor>> {
        let merged = self.graph.merged_candidates(index)?;
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut ranked: Vec<Neighbor> = merged
            .into_iter()
            .map(|(node, weight)| Neighbor { node, weight })
            .collect();
        ranked.sort_by(|a, b| b.weight.total_cmp(&a.weight).then(a.node.cmp(&b.node)));
        ranked.truncate(n);
        Ok(ranked)
    }

    /// Resolves ranked neighbors to catalog entries, keeping their order.
    pub fn assemble(&self, ranked: &[Neighbor]) -> Result<Vec<Recommendation>> {
        ranked
            .iter()
            .map(|nb| {
                let track = self.catalog.lookup(nb.node)?;
                Ok(Recommendation {
                    display_name: track.display_name.clone(),
                    external_id: track.external_id.clone(),
                    index: nb.node,
                    weight: nb.weight,
                })
            })
            .collect()
    }

    pub fn get_recommendations(
        &self,
        external_id: &str,
        count: usize,
    ) -> Result<Vec<Recommendation>> {
        let index = self.catalog.resolve(external_id)?;
        let out = self
            .recommend(index, count)
            .and_then(|ranked| self.assemble(&ranked));
        if let Err(e @ TunegraphError::InternalConsistency(_)) = &out {
            tracing::error!(track = %external_id, index, "snapshot inconsistency: {e}");
        }
        out
    }
}
