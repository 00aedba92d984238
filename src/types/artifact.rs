//! Input artifacts and the scalar surface metadata shared by a population.

use serde::{Deserialize, Serialize};

use crate::error::{ReconstructError, Result};

/// A retained `(rank, differentium)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Allele {
    pub rank: u64,
    pub differentia: u64,
}

impl Allele {
    #[must_use]
    pub const fn new(rank: u64, differentia: u64) -> Self {
        Self { rank, differentia }
    }
}

/// One hereditary stratigraphic artifact: its final generation count and the
/// alleles its retention policy kept, in ascending rank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub data_id: u64,
    /// Number of strata deposited, `T`.
    pub num_strata_deposited: u64,
    pub ranks: Vec<u64>,
    pub differentia: Vec<u64>,
}

impl Artifact {
    pub fn new(data_id: u64, num_strata_deposited: u64, alleles: &[(u64, u64)]) -> Self {
        let (ranks, differentia) = alleles.iter().copied().unzip();
        Self {
            data_id,
            num_strata_deposited,
            ranks,
            differentia,
        }
    }

    pub fn alleles(&self) -> impl Iterator<Item = Allele> + '_ {
        self.ranks
            .iter()
            .zip(&self.differentia)
            .map(|(&rank, &differentia)| Allele::new(rank, differentia))
    }

    /// Rank carried by this artifact's leaf record.
    #[must_use]
    pub fn leaf_rank(&self) -> u64 {
        self.num_strata_deposited.saturating_sub(1)
    }
}

/// Checks that `ranks` is strictly ascending, below `t`, and paired with
/// `differentia` one to one.
pub(crate) fn validate_alleles(
    data_id: u64,
    t: u64,
    ranks: &[u64],
    differentia: &[u64],
) -> Result<()> {
    if ranks.len() != differentia.len() {
        return Err(ReconstructError::MalformedArtifact {
            data_id,
            reason: "rank and differentia sequences differ in length".into(),
        });
    }
    if let Some(&last) = ranks.last() {
        if last >= t {
            return Err(ReconstructError::MalformedArtifact {
                data_id,
                reason: format!("rank {last} is not below T={t}").into(),
            });
        }
    }
    if let Some(pair) = ranks.windows(2).find(|pair| pair[0] >= pair[1]) {
        return Err(ReconstructError::MalformedArtifact {
            data_id,
            reason: format!("ranks not strictly ascending ({} then {})", pair[0], pair[1])
                .into(),
        });
    }
    Ok(())
}

/// Scalars describing the surface layout shared by every artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceMeta {
    /// Buffer capacity `S` (differentia slots per artifact).
    pub dstream_s: u64,
    pub differentia_bitwidth: u64,
}

impl SurfaceMeta {
    /// Derive the metadata from the buffer capacity and total storage bitwidth.
    pub fn from_storage(dstream_s: u64, storage_bitwidth: u64) -> Result<Self> {
        // Every site needs at least one bit.
        if dstream_s == 0 || storage_bitwidth < dstream_s || storage_bitwidth % dstream_s != 0 {
            return Err(ReconstructError::BitwidthMismatch {
                storage_bitwidth,
                dstream_s,
            });
        }
        Ok(Self {
            dstream_s,
            differentia_bitwidth: storage_bitwidth / dstream_s,
        })
    }
}
