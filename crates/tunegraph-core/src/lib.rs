pub mod catalog;
pub mod engine;
pub mod error;
pub mod graph;
pub mod snapshot;

pub use catalog::{Catalog, CatalogRecord, Track};
pub use engine::{Recommendation, Recommender};
pub use error::TunegraphError;
pub use graph::{Edge, Neighbor, SimilarityGraph};
pub use snapshot::{GraphSnapshot, Snapshot};
