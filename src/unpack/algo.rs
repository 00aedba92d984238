//! Retention algorithms: which ingest time each buffer site holds after `T` ingests.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::{ReconstructError, Result};

/// Maps buffer sites to the ingest time (rank) they currently hold.
pub trait RetentionAlgorithm: Send + Sync {
    /// Canonical `dstream_algo` tag.
    fn name(&self) -> &'static str;

    /// Ingest time held by each of the `S` sites after `T` ingests; `None`
    /// for sites not yet written.
    fn lookup_ingest_times(&self, buffer_size: u64, num_ingests: u64) -> Vec<Option<u64>>;
}

/// Ring buffer: ingest `t` overwrites site `t mod S`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CircularAlgo;

impl RetentionAlgorithm for CircularAlgo {
    fn name(&self) -> &'static str {
        "dstream.circular_algo"
    }

    fn lookup_ingest_times(&self, buffer_size: u64, num_ingests: u64) -> Vec<Option<u64>> {
        (0..buffer_size)
            .map(|site| {
                (num_ingests > site).then(|| {
                    let laps = (num_ingests - 1 - site) / buffer_size;
                    site + laps * buffer_size
                })
            })
            .collect()
    }
}

static CIRCULAR: CircularAlgo = CircularAlgo;

static REGISTRY: Lazy<HashMap<&'static str, &'static dyn RetentionAlgorithm>> = Lazy::new(|| {
    let mut registry: HashMap<&'static str, &'static dyn RetentionAlgorithm> = HashMap::new();
    registry.insert(CIRCULAR.name(), &CIRCULAR);
    registry.insert("circular_algo", &CIRCULAR);
    registry
});

/// Resolve a `dstream_algo` tag.
pub fn lookup_algorithm(tag: &str) -> Result<&'static dyn RetentionAlgorithm> {
    REGISTRY
        .get(tag.trim())
        .copied()
        .ok_or_else(|| ReconstructError::UnsupportedAlgorithm {
            algo: tag.to_owned(),
        })
}
