use crate::address::Subnet;
use crate::energy::{Energy, EnergyScorer};
use crate::inout::EnrichedRow;

pub mod queue;

/// Rank given to blocks that are too small or have no usable signal.
pub const UNINTERESTING_RANK: f64 = 1000.0;

/// The rows of one client subnet, scored once at construction.
#[derive(Debug)]
pub struct Block {
    pub subnet: Subnet,
    pub rows: Vec<EnrichedRow>,
    pub energy: Energy,
    pub rank: f64,
}

impl Block {
    /// Move the rows selected by `rowmask` out of `parent` into a new block.
    ///
    /// Returns the block and the unselected rows, which keep their original order.
    pub fn fork(
        parent: Vec<EnrichedRow>,
        rowmask: &[bool],
        subnet: Subnet,
        scorer: &EnergyScorer,
    ) -> (Block, Vec<EnrichedRow>) {
        assert!(parent.len() == rowmask.len());
        let mut mine: Vec<EnrichedRow> = Vec::new();
        let mut rest: Vec<EnrichedRow> = Vec::with_capacity(parent.len());
        for (row, &selected) in parent.into_iter().zip(rowmask.iter()) {
            if selected {
                mine.push(row);
            } else {
                rest.push(row);
            }
        }
        let energy = scorer.score(mine.iter().map(|r| (r.bucket, r.value)));
        let rank = rank_energy(&energy, scorer.bucket_count());
        let block = Block {
            subnet,
            rows: mine,
            energy,
            rank,
        };
        (block, rest)
    }

    pub fn first_row(&self) -> Option<&EnrichedRow> {
        self.rows.first()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Lower is more interesting: `-100 * log10(nratio)`, or `UNINTERESTING_RANK` when
/// there are fewer rows than buckets or `nratio` is undefined or non-positive.
pub fn rank_energy(energy: &Energy, bucket_count: usize) -> f64 {
    if energy.nrows < bucket_count {
        return UNINTERESTING_RANK;
    }
    match energy.nratio {
        Some(nratio) if nratio > 0.0 && nratio.is_finite() => -100.0 * nratio.log10(),
        _ => UNINTERESTING_RANK,
    }
}
