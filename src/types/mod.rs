//! Public types exposed by the `hstrat-trie` crate.

pub mod artifact;
pub mod options;
pub mod stats;

pub use artifact::{Allele, Artifact, SurfaceMeta};
pub use options::{ReconstructOptions, ReconstructOptionsBuilder};
pub use stats::ReconstructStats;
