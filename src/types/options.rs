//! Builder-style options controlling a reconstruction run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_COLLAPSE_EVERY};

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_collapse_every() -> usize {
    DEFAULT_COLLAPSE_EVERY
}

fn default_check_invariants() -> bool {
    cfg!(debug_assertions)
}

/// Tunable options for a reconstruction run.
///
/// Every field has a serde default so a partial JSON document is a valid
/// options file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconstructOptions {
    /// Run a dropped-only unifurcation collapse after every `collapse_every`
    /// consumed chunks. 0 disables intra-run collapses.
    #[serde(default = "default_collapse_every")]
    pub collapse_every: usize,
    /// Upper bound on unpacked rows per chunk. An artifact is never split,
    /// so a single oversized artifact still forms its own chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Accept results where the root has more than one child.
    #[serde(default)]
    pub force_common_ancestry: bool,
    /// Run the invariant suite after every chunk and after finalization.
    #[serde(default = "default_check_invariants")]
    pub check_invariants: bool,
    /// Directory for chunk files; the platform temp dir when unset.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            collapse_every: default_collapse_every(),
            chunk_size: default_chunk_size(),
            force_common_ancestry: false,
            check_invariants: default_check_invariants(),
            temp_dir: None,
        }
    }
}

impl ReconstructOptions {
    /// Start a fluent builder for `ReconstructOptions`.
    #[must_use]
    pub fn builder() -> ReconstructOptionsBuilder {
        ReconstructOptionsBuilder::default()
    }

    /// Chunk size clamped to at least one row.
    #[must_use]
    pub(crate) fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }

    /// Whether a dropped-only collapse is due after `chunks_consumed` chunks.
    #[must_use]
    pub(crate) fn collapse_due(&self, chunks_consumed: usize) -> bool {
        self.collapse_every != 0 && chunks_consumed % self.collapse_every == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconstructOptionsBuilder {
    inner: ReconstructOptions,
}

impl ReconstructOptionsBuilder {
    #[must_use]
    pub fn collapse_every(mut self, every: usize) -> Self {
        self.inner.collapse_every = every;
        self
    }

    #[must_use]
    pub fn chunk_size(mut self, rows: usize) -> Self {
        self.inner.chunk_size = rows;
        self
    }

    #[must_use]
    pub fn force_common_ancestry(mut self, enabled: bool) -> Self {
        self.inner.force_common_ancestry = enabled;
        self
    }

    #[must_use]
    pub fn check_invariants(mut self, enabled: bool) -> Self {
        self.inner.check_invariants = enabled;
        self
    }

    pub fn temp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.inner.temp_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn build(self) -> ReconstructOptions {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let options: ReconstructOptions =
            serde_json::from_str(r#"{"chunk_size": 32, "force_common_ancestry": true}"#)
                .expect("parse options");
        assert_eq!(options.chunk_size, 32);
        assert!(options.force_common_ancestry);
        assert_eq!(options.collapse_every, DEFAULT_COLLAPSE_EVERY);
        assert!(options.temp_dir.is_none());
    }

    #[test]
    fn collapse_schedule() {
        let options = ReconstructOptions::builder().collapse_every(3).build();
        assert!(!options.collapse_due(1));
        assert!(options.collapse_due(3));
        assert!(options.collapse_due(6));

        let disabled = ReconstructOptions::builder().collapse_every(0).build();
        assert!(!disabled.collapse_due(0));
        assert!(!disabled.collapse_due(5));
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        let options = ReconstructOptions::builder().chunk_size(0).build();
        assert_eq!(options.effective_chunk_size(), 1);
    }
}
