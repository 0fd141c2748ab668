use crate::{
    primitives::{reed_solomon::N, ReedSolomonDecoder, UNCORRECTABLE},
    profile::{ProtocolProfile, RsVariant},
};

/// Result of correcting an interleaved code block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FecOutcome {
    /// Symbols corrected over all correctable blocks.
    pub corrections: u32,
    /// Every block was uncorrectable.
    pub corrupted: bool,
}

/// Copy the `idx`th of `interleave` codewords out of `block`.
fn deinterleave(block: &[u8], idx: usize, interleave: usize, codeword: &mut [u8; N]) {
    for (j, b) in codeword.iter_mut().enumerate() {
        *b = block[idx + j * interleave];
    }
}

fn interleave(codeword: &[u8; N], idx: usize, interleave: usize, block: &mut [u8]) {
    for (j, b) in codeword.iter().enumerate() {
        block[idx + j * interleave] = *b;
    }
}

/// Interleaved Reed-Solomon correction.
///
/// A frame is only considered corrupted when all of its blocks are uncorrectable, so data
/// from correctable blocks of a partially damaged frame is still forwarded.
pub struct FecStage {
    variant: RsVariant,
    codeword: [u8; N],
    results: Vec<i32>,
}

impl FecStage {
    #[must_use]
    pub fn new(profile: &ProtocolProfile) -> Self {
        Self {
            variant: profile.rs_variant,
            codeword: [0u8; N],
            results: vec![0; profile.rs_blocks],
        }
    }

    /// Per-block results of the last call to [FecStage::correct], a correction count or
    /// [UNCORRECTABLE].
    #[must_use]
    pub fn block_results(&self) -> &[i32] {
        &self.results
    }

    /// Correct the interleaved code block at the start of `block`, writing the result to
    /// `out`.
    pub fn correct(
        &mut self,
        rs: &mut dyn ReedSolomonDecoder,
        block: &[u8],
        out: &mut [u8],
    ) -> FecOutcome {
        let depth = self.results.len();
        let mut corrections = 0u32;
        for idx in 0..depth {
            deinterleave(block, idx, depth, &mut self.codeword);
            let zult = rs.decode(&mut self.codeword, self.variant);
            interleave(&self.codeword, idx, depth, out);
            self.results[idx] = zult;
            if zult != UNCORRECTABLE {
                corrections += zult.unsigned_abs();
            }
        }
        FecOutcome {
            corrections,
            corrupted: self.results.iter().all(|r| *r == UNCORRECTABLE),
        }
    }
}
