use crate::error::{Result, TunegraphError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One catalog row as it is persisted: external id -> (index, name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub external_id: String,
    pub index: u32,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub external_id: String,
    pub display_name: String,
}

/// Read-only mapping between external track ids and dense graph indices.
///
/// `tracks[i]` describes node `i`; `by_external` is its inverse.
#[derive(Debug, Default)]
pub struct Catalog {
    by_external: HashMap<String, u32>,
    tracks: Vec<Track>,
}

impl Catalog {
    /// Builds a catalog from records in any order.
    ///
    /// Fails with `Validation` on duplicate external ids, duplicate indices or
    /// indices that do not cover `0..records.len()` exactly.
    pub fn from_records(records: impl IntoIterator<Item = CatalogRecord>) -> Result<Self> {
        let records: Vec<CatalogRecord> = records.into_iter().collect();
        let len = records.len();
        let mut slots: Vec<Option<Track>> = vec![None; len];
        let mut by_external = HashMap::with_capacity(len);

        for rec in records {
            let slot = slots.get_mut(rec.index as usize).ok_or_else(|| {
                TunegraphError::Validation(format!(
                    "track '{}' has index {} but catalog holds {} tracks",
                    rec.external_id, rec.index, len
                ))
            })?;
            if slot.is_some() {
                return Err(TunegraphError::Validation(format!(
                    "index {} assigned to more than one track",
                    rec.index
                )));
            }
            if by_external.insert(rec.external_id.clone(), rec.index).is_some() {
                return Err(TunegraphError::Validation(format!(
                    "duplicate external id '{}'",
                    rec.external_id
                )));
            }
            *slot = Some(Track {
                external_id: rec.external_id,
                display_name: rec.display_name,
            });
        }

        // every index is in range and unique, so with len records every slot is filled
        let tracks = slots.into_iter().flatten().collect();
        Ok(Self {
            by_external,
            tracks,
        })
    }

    pub fn resolve(&self, external_id: &str) -> Result<u32> {
        self.by_external
            .get(external_id)
            .copied()
            .ok_or_else(|| TunegraphError::NotFound(format!("track '{external_id}'")))
    }

    /// Looks up a node the graph produced. A miss means the snapshot pair is
    /// out of sync, not that the caller asked for something unknown.
    pub fn lookup(&self, index: u32) -> Result<&Track> {
        self.tracks.get(index as usize).ok_or_else(|| {
            TunegraphError::InternalConsistency(format!(
                "graph node {index} has no catalog entry ({} tracks)",
                self.tracks.len()
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Records in index order.
    pub fn iter(&self) -> impl Iterator<Item = CatalogRecord> + '_ {
        self.tracks
            .iter()
            .enumerate()
            .map(|(i, t)| CatalogRecord {
                external_id: t.external_id.clone(),
                index: i as u32,
                display_name: t.display_name.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, index: u32, name: &str) -> CatalogRecord {
        CatalogRecord {
            external_id: id.to_string(),
            index,
            display_name: name.to_string(),
        }
    }

    fn abc() -> Catalog {
        Catalog::from_records(vec![
            rec("trackC", 2, "Song C"),
            rec("trackA", 0, "Song A"),
            rec("trackB", 1, "Song B"),
        ])
        .unwrap()
    }

    #[test]
    fn resolve_and_lookup_round_trip() -> Result<()> {
        let cat = abc();
        for id in ["trackA", "trackB", "trackC"] {
            let idx = cat.resolve(id)?;
            assert_eq!(cat.resolve(id)?, idx);
            assert_eq!(cat.lookup(idx)?.external_id, id);
        }
        assert_eq!(cat.lookup(2)?.display_name, "Song C");
        Ok(())
    }

    #[test]
    fn unknown_id_is_not_found() {
        let err = abc().resolve("unknownTrack").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn lookup_miss_is_consistency_error() {
        let err = abc().lookup(3).unwrap_err();
        assert!(matches!(err, TunegraphError::InternalConsistency(_)));
    }

    #[test]
    fn rejects_duplicate_external_id() {
        let err = Catalog::from_records(vec![rec("a", 0, "A"), rec("a", 1, "A again")])
            .unwrap_err();
        assert!(matches!(err, TunegraphError::Validation(_)));
    }

    #[test]
    fn rejects_duplicate_and_sparse_indices() {
        let dup = Catalog::from_records(vec![rec("a", 0, "A"), rec("b", 0, "B")]);
        assert!(matches!(dup, Err(TunegraphError::Validation(_))));
        let sparse = Catalog::from_records(vec![rec("a", 0, "A"), rec("b", 5, "B")]);
        assert!(matches!(sparse, Err(TunegraphError::Validation(_))));
    }

    #[test]
    fn iter_yields_index_order() {
        let ids: Vec<String> = abc().iter().map(|r| r.external_id).collect();
        assert_eq!(ids, vec!["trackA", "trackB", "trackC"]);
    }
}
