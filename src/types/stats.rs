use serde::{Deserialize, Serialize};

/// Counters gathered over one reconstruction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconstructStats {
    pub artifacts: u64,
    pub unpacked_rows: u64,
    pub chunks: u64,
    /// Dropped-only collapses run between chunks.
    pub collapses: u64,
    pub peak_records: u64,
    pub final_records: u64,
}

impl ReconstructStats {
    pub(crate) fn observe_records(&mut self, records: usize) {
        self.peak_records = self.peak_records.max(records as u64);
    }
}
