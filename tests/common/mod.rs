//! Synthesized downlink streams for integration tests.
#![allow(dead_code)]

use rand::{rngs::StdRng, Rng, SeedableRng};
use wxdecode::{
    primitives::{descramble, reed_solomon, ConvolutionalEncoder},
    profile::{Coding, InputEncoding, PhaseShift, ASM},
    ProtocolProfile, Registry,
};

/// Symbols of noise before the first frame.
pub const LEADING_SYMBOLS: usize = 1000;

pub struct TestFrame {
    pub payload: Vec<u8>,
    /// Damage the frame beyond what Reed-Solomon can correct.
    pub corrupt: bool,
}

pub fn profile(key: &str) -> ProtocolProfile {
    (*Registry::default().get(key).unwrap()).clone()
}

/// Payload with a frame header followed by random data.
pub fn payload(
    profile: &ProtocolProfile,
    scid: u8,
    vcid: u8,
    counter: u32,
    rng: &mut StdRng,
) -> Vec<u8> {
    let mut dat: Vec<u8> = (0..profile.payload_size()).map(|_| rng.gen()).collect();
    dat[0] = 0x40 | (scid >> 2);
    dat[1] = ((scid & 0x03) << 6) | (vcid & 0x3f);
    dat[2..5].copy_from_slice(&counter.to_be_bytes()[1..]);
    dat[5] = 0;
    dat
}

/// Frames on a single virtual channel with the given counters.
pub fn frames(
    profile: &ProtocolProfile,
    counters: &[u32],
    corrupt: &[usize],
    seed: u64,
) -> Vec<TestFrame> {
    let mut rng = StdRng::seed_from_u64(seed);
    counters
        .iter()
        .enumerate()
        .map(|(idx, counter)| TestFrame {
            payload: payload(profile, 157, 16, *counter, &mut rng),
            corrupt: corrupt.contains(&idx),
        })
        .collect()
}

/// Payloads the decoder is expected to output for `frames`.
pub fn expected_payloads(frames: &[TestFrame]) -> Vec<Vec<u8>> {
    frames
        .iter()
        .filter(|f| !f.corrupt)
        .map(|f| f.payload.clone())
        .collect()
}

/// ASM followed by the scrambled, interleaved Reed-Solomon code block.
fn cadu(profile: &ProtocolProfile, frame: &TestFrame) -> Vec<u8> {
    let depth = profile.rs_blocks;
    let mut block = vec![0u8; reed_solomon::N * depth];
    for idx in 0..depth {
        let message: Vec<u8> = frame
            .payload
            .iter()
            .skip(idx)
            .step_by(depth)
            .copied()
            .collect();
        let codeword = reed_solomon::encode(&message, profile.rs_variant);
        for (j, b) in codeword.iter().enumerate() {
            block[idx + j * depth] = *b;
        }
    }
    if frame.corrupt {
        for b in &mut block[..profile.payload_size()] {
            *b ^= 0xff;
        }
    }
    let len = block.len();
    descramble(&mut block, len);

    let mut dat = ASM.to_vec();
    dat.extend_from_slice(&block);
    dat
}

fn nrzm_encode(dat: &mut [u8], last: &mut u8) {
    for byte in dat.iter_mut() {
        let mut out = 0u8;
        for k in (0..8).rev() {
            let bit = ((*byte >> k) & 1) ^ *last;
            out = (out << 1) | bit;
            *last = bit;
        }
        *byte = out;
    }
}

fn rotate(i: u8, q: u8, phase: PhaseShift, iq_inverted: bool) -> (u8, u8) {
    let (i, q) = if iq_inverted { (q, i) } else { (i, q) };
    match phase {
        PhaseShift::Deg0 => (i, q),
        PhaseShift::Deg90 => (!q, i),
        PhaseShift::Deg180 => (!i, !q),
        PhaseShift::Deg270 => (q, !i),
    }
}

/// Encode `frames` into the stream the profile expects, preceded by noise.
pub fn stream(
    profile: &ProtocolProfile,
    frames: &[TestFrame],
    phase: PhaseShift,
    iq_inverted: bool,
) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut encoder = ConvolutionalEncoder::new();
    let mut nrzm_last = 0u8;

    let mut symbols: Vec<u8> = Vec::new();
    for frame in frames {
        let mut dat = cadu(profile, frame);
        if profile.differential {
            nrzm_encode(&mut dat, &mut nrzm_last);
        }
        match profile.coding {
            Coding::Viterbi27 => encoder.encode(&dat, &mut symbols),
            Coding::Uncoded => symbols.extend_from_slice(&dat),
        }
    }

    if profile.input == InputEncoding::PackedBits {
        let mut out: Vec<u8> = (0..LEADING_SYMBOLS / 8).map(|_| rng.gen()).collect();
        out.extend_from_slice(&symbols);
        return out;
    }

    for pair in symbols.chunks_exact_mut(2) {
        let (i, q) = rotate(pair[0], pair[1], phase, iq_inverted);
        pair[0] = i;
        pair[1] = q;
    }
    let mut out: Vec<u8> = (0..LEADING_SYMBOLS).map(|_| rng.gen()).collect();
    out.extend_from_slice(&symbols);
    out
}

/// Byte offset of frame `idx` within a stream built by [stream].
pub fn frame_offset(profile: &ProtocolProfile, idx: usize) -> usize {
    let symbols = LEADING_SYMBOLS + idx * profile.coded_frame_size;
    match profile.input {
        InputEncoding::PackedBits => symbols / 8,
        InputEncoding::SoftSymbols => symbols,
    }
}
