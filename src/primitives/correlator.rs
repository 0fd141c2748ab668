use super::{Correlation, Correlator};

/// Hard-decision sliding correlator.
///
/// Symbols above 128 are taken as ones. Ties keep the earliest offset and the lowest word
/// index.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCorrelator;

impl Correlator for DefaultCorrelator {
    fn correlate(
        &mut self,
        buffer: &[u8],
        length: usize,
        words: &[u64],
        bits: usize,
    ) -> Correlation {
        let length = length.min(buffer.len());
        let mut best = Correlation::default();
        if words.is_empty() || bits == 0 || bits > 64 || length < bits {
            return best;
        }
        let mask = if bits == 64 {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        };
        let width = u32::try_from(bits).unwrap_or(64);

        let mut window = 0u64;
        for (idx, &symbol) in buffer[..length].iter().enumerate() {
            window = (window << 1) | u64::from(symbol > 128);
            if idx + 1 < bits {
                continue;
            }
            for (word_idx, word) in words.iter().enumerate() {
                let score = width - ((window ^ word) & mask).count_ones();
                if score > best.score {
                    best = Correlation {
                        offset: idx + 1 - bits,
                        score,
                        word: word_idx,
                    };
                }
            }
        }
        best
    }
}
