//! Low-level DSP and FEC collaborators used by the [Decoder](crate::Decoder).
//!
//! Each concern is a trait so the frame pipeline never depends on a concrete
//! implementation. The defaults in this module are pure Rust.
mod correlator;
mod line;
pub mod reed_solomon;
mod viterbi;

pub use correlator::DefaultCorrelator;
pub use line::{
    descramble, differential_decode, fix_phase_and_inversion, DefaultLineCoding, PN_SEQUENCE,
};
pub use reed_solomon::DefaultReedSolomon;
pub use viterbi::{ConvolutionalEncoder, Viterbi27};

use crate::profile::{PhaseShift, RsVariant};

/// Best match found by a [Correlator].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Correlation {
    /// Symbol offset of the start of the matched word.
    pub offset: usize,
    /// Number of agreeing symbols.
    pub score: u32,
    /// Index of the matched word.
    pub word: usize,
}

pub trait Correlator: Send {
    /// Find the offset and word with the highest score within the first `length` symbols
    /// of `buffer`. Each word is `bits` symbols wide.
    fn correlate(&mut self, buffer: &[u8], length: usize, words: &[u64], bits: usize)
        -> Correlation;
}

/// Outcome of a convolutional decode.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViterbiResult {
    /// Channel symbols disagreeing with the re-encoded survivor path.
    pub bit_errors: u32,
    /// `bit_errors` as a percentage of decoded bits.
    pub percent_ber: f32,
}

pub trait ConvolutionalDecoder: Send {
    /// Decode soft symbol pairs from `symbols` into packed bits in `out`, MSB first.
    fn decode(&mut self, symbols: &[u8], out: &mut [u8]) -> ViterbiResult;
}

/// Returned by [ReedSolomonDecoder::decode] for an uncorrectable codeword.
pub const UNCORRECTABLE: i32 = -1;

pub trait ReedSolomonDecoder: Send {
    /// Correct a single 255 byte codeword in place, returning the number of corrected
    /// symbols, or [UNCORRECTABLE].
    fn decode(&mut self, codeword: &mut [u8; reed_solomon::N], variant: RsVariant) -> i32;
}

/// Line coding and soft symbol housekeeping.
pub trait LineCoding: Send {
    /// XOR the first `len` bytes with the CCSDS pseudo-noise sequence.
    fn descramble(&self, buffer: &mut [u8], len: usize);
    /// NRZ-M decode the first `len` bytes.
    fn differential_decode(&self, buffer: &mut [u8], len: usize);
    /// Undo a phase rotation and optional I/Q swap on the first `len` soft symbols.
    fn fix_phase_and_inversion(
        &self,
        buffer: &mut [u8],
        len: usize,
        phase: PhaseShift,
        iq_inverted: bool,
    );
}
