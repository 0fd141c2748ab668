use super::{ConvolutionalDecoder, ViterbiResult};

/// Generator polynomials of the CCSDS K=7 rate 1/2 code.
pub const POLY_A: u8 = 0x4f;
pub const POLY_B: u8 = 0x6d;

const STATES: usize = 64;

const fn parity(x: u8) -> u8 {
    (x.count_ones() & 1) as u8
}

/// Expected output symbols for each 7 bit shift register value.
const OUTPUTS: [[u8; 2]; 128] = {
    let mut table = [[0u8; 2]; 128];
    let mut sr = 0;
    while sr < 128 {
        table[sr] = [parity(sr as u8 & POLY_A), parity(sr as u8 & POLY_B)];
        sr += 1;
    }
    table
};

#[inline]
fn branch_cost(expected: u8, symbol: u8) -> u32 {
    if expected == 1 {
        u32::from(255 - symbol)
    } else {
        u32::from(symbol)
    }
}

/// Soft-decision Viterbi decoder for the K=7 rate 1/2 code.
///
/// Every start state begins with the same metric so decoding may start mid-stream. The
/// traceback starts from the best final state.
#[derive(Debug, Clone, Default)]
pub struct Viterbi27 {
    decisions: Vec<u64>,
}

impl Viterbi27 {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConvolutionalDecoder for Viterbi27 {
    fn decode(&mut self, symbols: &[u8], out: &mut [u8]) -> ViterbiResult {
        let steps = (symbols.len() / 2).min(out.len() * 8);
        self.decisions.clear();
        self.decisions.resize(steps, 0);

        let mut metrics = [0u32; STATES];
        let mut next = [0u32; STATES];
        for (step, pair) in symbols.chunks_exact(2).take(steps).enumerate() {
            let mut decision = 0u64;
            for (state, metric) in next.iter_mut().enumerate() {
                let bit = state & 1;
                let p0 = state >> 1;
                let p1 = p0 | 0x20;
                let [a0, b0] = OUTPUTS[(p0 << 1) | bit];
                let [a1, b1] = OUTPUTS[((p1 << 1) | bit) & 0x7f];
                let m0 = metrics[p0] + branch_cost(a0, pair[0]) + branch_cost(b0, pair[1]);
                let m1 = metrics[p1] + branch_cost(a1, pair[0]) + branch_cost(b1, pair[1]);
                if m1 < m0 {
                    *metric = m1;
                    decision |= 1 << state;
                } else {
                    *metric = m0;
                }
            }
            let min = next.iter().copied().min().unwrap_or(0);
            for (m, n) in metrics.iter_mut().zip(next.iter()) {
                *m = n - min;
            }
            self.decisions[step] = decision;
        }

        let mut state = metrics
            .iter()
            .enumerate()
            .min_by_key(|(_, m)| **m)
            .map_or(0, |(s, _)| s);

        out[..steps.div_ceil(8)].fill(0);
        let mut bit_errors = 0u32;
        for step in (0..steps).rev() {
            let bit = state & 1;
            let prev = if (self.decisions[step] >> state) & 1 == 1 {
                (state >> 1) | 0x20
            } else {
                state >> 1
            };
            if bit == 1 {
                out[step / 8] |= 0x80 >> (step % 8);
            }
            let expected = OUTPUTS[((prev << 1) | bit) & 0x7f];
            for (symbol, expected) in symbols[2 * step..2 * step + 2].iter().zip(expected) {
                // erasures carry no information
                if *symbol != 128 && u8::from(*symbol > 128) != expected {
                    bit_errors += 1;
                }
            }
            state = prev;
        }

        #[allow(clippy::cast_precision_loss)]
        let percent_ber = if steps == 0 {
            0.0
        } else {
            100.0 * bit_errors as f32 / steps as f32
        };
        ViterbiResult {
            bit_errors,
            percent_ber,
        }
    }
}

/// K=7 rate 1/2 convolutional encoder producing saturated soft symbols.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvolutionalEncoder {
    state: u8,
}

impl ConvolutionalEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `data` MSB first, appending two symbols, `0x00` or `0xff`, per bit.
    pub fn encode(&mut self, data: &[u8], symbols: &mut Vec<u8>) {
        symbols.reserve(data.len() * 16);
        for byte in data {
            for k in (0..8).rev() {
                self.state = ((self.state << 1) | ((byte >> k) & 1)) & 0x7f;
                for sym in OUTPUTS[usize::from(self.state)] {
                    symbols.push(if sym == 1 { 0xff } else { 0x00 });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::profile::ASM;

    fn hard(symbols: &[u8]) -> u64 {
        symbols
            .iter()
            .fold(0u64, |acc, s| (acc << 1) | u64::from(*s > 128))
    }

    #[test]
    fn encoded_asm() {
        let mut symbols = Vec::new();
        ConvolutionalEncoder::new().encode(&ASM, &mut symbols);
        assert_eq!(symbols.len(), 64);
        assert_eq!(hard(&symbols), 0x035d_49c2_4ff2_686b);
    }

    #[test]
    fn decode_clean_stream() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let data: Vec<u8> = (0..256).map(|_| rng.gen()).collect();
        let mut symbols = Vec::new();
        ConvolutionalEncoder::new().encode(&data, &mut symbols);

        let mut out = vec![0u8; data.len()];
        let zult = Viterbi27::new().decode(&symbols, &mut out);
        assert_eq!(out, data);
        assert_eq!(zult.bit_errors, 0);
        assert!(zult.percent_ber.abs() < f32::EPSILON);
    }

    #[test]
    fn decode_mid_stream() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        let data: Vec<u8> = (0..128).map(|_| rng.gen()).collect();
        let mut symbols = Vec::new();
        ConvolutionalEncoder::new().encode(&data, &mut symbols);

        // start decoding after the first 16 bytes, encoder state is unknown
        let mut out = vec![0u8; 112];
        let zult = Viterbi27::new().decode(&symbols[16 * 16..], &mut out);
        assert_eq!(out, data[16..]);
        assert_eq!(zult.bit_errors, 0);
    }

    #[test]
    fn corrects_and_counts_symbol_errors() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let data: Vec<u8> = (0..256).map(|_| rng.gen()).collect();
        let mut symbols = Vec::new();
        ConvolutionalEncoder::new().encode(&data, &mut symbols);

        // sparse errors, well within the free distance of the code
        for idx in (100..symbols.len() - 100).step_by(97) {
            symbols[idx] = !symbols[idx];
        }
        let expected_errors = (100..symbols.len() - 100).step_by(97).count();

        let mut out = vec![0u8; data.len()];
        let zult = Viterbi27::new().decode(&symbols, &mut out);
        assert_eq!(out, data);
        assert_eq!(zult.bit_errors as usize, expected_errors);
        assert!(zult.percent_ber > 0.0);
    }

    #[test]
    fn erasures_are_not_errors() {
        let data = [0xa5u8; 32];
        let mut symbols = vec![128u8; 64];
        ConvolutionalEncoder::new().encode(&data, &mut symbols);

        let mut out = vec![0u8; 36];
        let zult = Viterbi27::new().decode(&symbols, &mut out);
        assert_eq!(&out[4..], &data[..]);
        assert_eq!(zult.bit_errors, 0);
    }
}
