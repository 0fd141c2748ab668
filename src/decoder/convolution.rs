use crate::{
    primitives::{ConvolutionalDecoder, ViterbiResult},
    profile::{Coding, ProtocolProfile},
};

/// Soft value carrying no information.
pub const NEUTRAL: u8 = 128;

/// Inner code stage.
///
/// For profiles with tail carryover the last `tail_symbols` coded symbols of each frame are
/// prepended to the next frame before decoding, so the decoder enters the frame with a
/// settled path. The bits decoded from the tail are discarded, and the reported bit error
/// count is reduced by half the tail length, saturating at zero.
pub struct ConvolutionalStage {
    coding: Coding,
    tail: Vec<u8>,
    extended: Vec<u8>,
    decoded: Vec<u8>,
}

impl ConvolutionalStage {
    #[must_use]
    pub fn new(profile: &ProtocolProfile) -> Self {
        let tail = vec![NEUTRAL; profile.tail_symbols];
        let (extended, decoded) = if tail.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            (
                Vec::with_capacity(profile.tail_symbols + profile.coded_frame_size),
                vec![0u8; profile.frame_size + profile.tail_symbols / 16],
            )
        };
        Self {
            coding: profile.coding,
            tail,
            extended,
            decoded,
        }
    }

    /// Forget the carried over tail.
    pub fn reset(&mut self) {
        self.tail.fill(NEUTRAL);
    }

    #[must_use]
    pub fn tail(&self) -> &[u8] {
        &self.tail
    }

    /// Decode one coded frame of `symbols` into `out`.
    pub fn decode(
        &mut self,
        decoder: &mut dyn ConvolutionalDecoder,
        symbols: &[u8],
        out: &mut [u8],
    ) -> ViterbiResult {
        match self.coding {
            Coding::Uncoded => {
                hard_slice(symbols, out);
                ViterbiResult::default()
            }
            Coding::Viterbi27 if self.tail.is_empty() => decoder.decode(symbols, out),
            Coding::Viterbi27 => {
                self.extended.clear();
                self.extended.extend_from_slice(&self.tail);
                self.extended.extend_from_slice(symbols);
                let zult = decoder.decode(&self.extended, &mut self.decoded);

                let skip = self.tail.len() / 16;
                let len = out.len().min(self.decoded.len() - skip);
                out[..len].copy_from_slice(&self.decoded[skip..skip + len]);

                let start = symbols.len().saturating_sub(self.tail.len());
                let n = symbols.len() - start;
                self.tail[..n].copy_from_slice(&symbols[start..]);

                let tail_errors = u32::try_from(self.tail.len() / 2).unwrap_or(u32::MAX);
                ViterbiResult {
                    bit_errors: zult.bit_errors.saturating_sub(tail_errors),
                    ..zult
                }
            }
        }
    }
}

/// Pack hard decisions, `symbol > 128` being a one, MSB first.
fn hard_slice(symbols: &[u8], out: &mut [u8]) {
    for (byte, chunk) in out.iter_mut().zip(symbols.chunks(8)) {
        *byte = chunk
            .iter()
            .fold(0u8, |acc, s| (acc << 1) | u8::from(*s > NEUTRAL));
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use test_case::test_case;

    use super::*;
    use crate::{
        primitives::{ConvolutionalEncoder, Viterbi27},
        Registry,
    };

    #[test]
    fn hard_slice_packs_msb_first() {
        let symbols = [0xff, 0x00, 0x81, 0x80, 0x00, 0x00, 0x00, 0xc0];
        let mut out = [0u8; 1];
        hard_slice(&symbols, &mut out);
        assert_eq!(out, [0b1010_0001]);
    }

    #[test]
    fn uncoded_profile_hard_slices() {
        let profile = Registry::default().get("hrd-cadu").unwrap();
        let mut stage = ConvolutionalStage::new(&profile);
        let symbols = vec![0xffu8; profile.coded_frame_size];
        let mut out = vec![0u8; profile.frame_size];

        let zult = stage.decode(&mut Viterbi27::new(), &symbols, &mut out);
        assert!(out.iter().all(|b| *b == 0xff));
        assert_eq!(zult.bit_errors, 0);
    }

    /// Decoder reporting a fixed error count.
    struct FixedErrors(u32);

    impl ConvolutionalDecoder for FixedErrors {
        fn decode(&mut self, _: &[u8], _: &mut [u8]) -> ViterbiResult {
            ViterbiResult {
                bit_errors: self.0,
                percent_ber: 1.5,
            }
        }
    }

    #[test_case("lrpt", 40, 8 ; "carryover discounts tail")]
    #[test_case("lrpt", 10, 0 ; "carryover saturates")]
    #[test_case("hrd", 40, 40 ; "no carryover")]
    fn bit_errors_exclude_tail(key: &str, reported: u32, expected: u32) {
        let profile = Registry::default().get(key).unwrap();
        let mut stage = ConvolutionalStage::new(&profile);
        let symbols = vec![NEUTRAL; profile.coded_frame_size];
        let mut out = vec![0u8; profile.frame_size];

        let zult = stage.decode(&mut FixedErrors(reported), &symbols, &mut out);
        assert_eq!(zult.bit_errors, expected);
        assert!((zult.percent_ber - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn tail_carryover_matches_continuous_decode() {
        let profile = Registry::default().get("lrpt").unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(5);
        let data: Vec<u8> = (0..profile.frame_size * 3).map(|_| rng.gen()).collect();
        let mut symbols = Vec::new();
        ConvolutionalEncoder::new().encode(&data, &mut symbols);

        let mut stage = ConvolutionalStage::new(&profile);
        let mut viterbi = Viterbi27::new();
        assert!(stage.tail().iter().all(|s| *s == NEUTRAL));

        let mut out = vec![0u8; profile.frame_size];
        for (idx, frame) in symbols.chunks(profile.coded_frame_size).enumerate() {
            stage.decode(&mut viterbi, frame, &mut out);
            let expected = &data[idx * profile.frame_size..(idx + 1) * profile.frame_size];
            assert_eq!(out, expected, "frame {idx}");
            assert_eq!(stage.tail(), &frame[frame.len() - profile.tail_symbols..]);
        }

        stage.reset();
        assert!(stage.tail().iter().all(|s| *s == NEUTRAL));
    }
}
