use crate::catalog::{Catalog, CatalogRecord};
use crate::engine::Recommender;
use crate::error::{Result, TunegraphError};
use crate::graph::{Edge, SimilarityGraph};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

pub const GRAPH_FILE: &str = "graph.bin";
pub const CATALOG_FILE: &str = "catalog.bin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub node_count: u32,
    pub edges: Vec<Edge>,
}

/// On-disk catalog/graph pair: a directory holding `graph.bin` and
/// `catalog.bin`, both bincode.
pub struct Snapshot;

impl Snapshot {
    pub fn load(dir: impl AsRef<Path>) -> Result<Recommender> {
        let dir = dir.as_ref();
        let graph: GraphSnapshot = read_bincode(&dir.join(GRAPH_FILE))?;
        let records: Vec<CatalogRecord> = read_bincode(&dir.join(CATALOG_FILE))?;
        let rec = Self::assemble(records, graph)?;
        tracing::info!(
            dir = %dir.display(),
            tracks = rec.catalog().len(),
            edges = rec.graph().edge_count(),
            "snapshot loaded"
        );
        Ok(rec)
    }

    pub fn save(dir: impl AsRef<Path>, rec: &Recommender) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let graph = GraphSnapshot {
            node_count: rec.graph().node_count(),
            edges: rec.graph().edges().to_vec(),
        };
        let records: Vec<CatalogRecord> = rec.catalog().iter().collect();
        write_bincode(&dir.join(GRAPH_FILE), &graph)?;
        write_bincode(&dir.join(CATALOG_FILE), &records)?;
        tracing::info!(dir = %dir.display(), tracks = records.len(), "snapshot saved");
        Ok(())
    }

    /// Builds a snapshot from the JSON interchange format:
    /// catalog `{"<id>": [index, "name"]}`, edges `[[u, v, weight], ...]`.
    /// The node count is the catalog size.
    pub fn import_json(catalog_json: &str, edges_json: &str) -> Result<Recommender> {
        let mapping: HashMap<String, (u32, String)> = serde_json::from_str(catalog_json)?;
        let raw_edges: Vec<(u32, u32, f64)> = serde_json::from_str(edges_json)?;
        let node_count = u32::try_from(mapping.len()).map_err(|_| {
            TunegraphError::Validation(format!("{} tracks exceed u32 indices", mapping.len()))
        })?;
        let records = mapping
            .into_iter()
            .map(|(external_id, (index, display_name))| CatalogRecord {
                external_id,
                index,
                display_name,
            })
            .collect();
        let graph = GraphSnapshot {
            node_count,
            edges: raw_edges
                .into_iter()
                .map(|(src, dst, weight)| Edge { src, dst, weight })
                .collect(),
        };
        Self::assemble(records, graph)
    }

    fn assemble(records: Vec<CatalogRecord>, graph: GraphSnapshot) -> Result<Recommender> {
        let catalog = Catalog::from_records(records)?;
        let graph = SimilarityGraph::from_edges(graph.node_count, graph.edges)?;
        Recommender::new(catalog, graph)
    }
}

fn read_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(reader)?)
}

fn write_bincode<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    bincode::serialize_into(&mut w, value)?;
    w.flush()?;
    w.get_ref().sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CATALOG: &str = r#"{
        "trackA": [0, "Song A"],
        "trackB": [1, "Song B"],
        "trackC": [2, "Song C"]
    }"#;
    const EDGES: &str = "[[0, 1, 5.0], [0, 2, 9.0]]";

    #[test]
    fn import_json_builds_recommender() -> Result<()> {
        let rec = Snapshot::import_json(CATALOG, EDGES)?;
        assert_eq!(rec.catalog().len(), 3);
        assert_eq!(rec.graph().edge_count(), 2);
        let top = rec.get_recommendations("trackA", 1)?;
        assert_eq!(top[0].display_name, "Song C");
        Ok(())
    }

    #[test]
    fn save_then_load_serves_same_results() -> Result<()> {
        let dir = tempdir().unwrap();
        let rec = Snapshot::import_json(CATALOG, EDGES)?;
        Snapshot::save(dir.path(), &rec)?;
        assert!(dir.path().join(GRAPH_FILE).exists());
        assert!(dir.path().join(CATALOG_FILE).exists());

        let loaded = Snapshot::load(dir.path())?;
        for id in ["trackA", "trackB", "trackC"] {
            assert_eq!(
                loaded.get_recommendations(id, 10)?,
                rec.get_recommendations(id, 10)?
            );
        }
        Ok(())
    }

    #[test]
    fn load_rejects_mismatched_pair() -> Result<()> {
        let dir = tempdir().unwrap();
        let rec = Snapshot::import_json(CATALOG, EDGES)?;
        Snapshot::save(dir.path(), &rec)?;
        write_bincode(
            &dir.path().join(GRAPH_FILE),
            &GraphSnapshot {
                node_count: 5,
                edges: vec![],
            },
        )?;
        let err = Snapshot::load(dir.path()).unwrap_err();
        assert!(matches!(err, TunegraphError::Validation(_)));
        Ok(())
    }

    #[test]
    fn missing_files_are_io_errors() {
        let dir = tempdir().unwrap();
        let err = Snapshot::load(dir.path()).unwrap_err();
        assert!(matches!(err, TunegraphError::Io(_)));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = Snapshot::import_json("{not json", EDGES).unwrap_err();
        assert!(matches!(err, TunegraphError::Json(_)));
    }
}
