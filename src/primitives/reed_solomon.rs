//! (255,223) Reed-Solomon codeword correction and encoding.
//!
//! Correction is done by [rs2], which operates on the CCSDS dual-basis representation.
//! Codewords in the conventional representation are mapped into the dual basis before
//! correction and back afterwards.
//!
//! # References
//! * [TM Synchronization and Channel Coding](https://ccsds.org/Pubs/131x0b5.pdf), Section 4
use rs2::{correct_message, RSState};

use super::{ReedSolomonDecoder, UNCORRECTABLE};
use crate::profile::RsVariant;

/// Codeword length.
pub const N: usize = 255;
/// Message length.
pub const K: usize = 223;
/// Check symbols per codeword.
pub const PARITY_LEN: usize = N - K;

const GF_POLY: u16 = 0x187;
const FCR: usize = 112;
const PRIM: usize = 11;
/// Log of zero.
const A0: u8 = 255;

const TAL: [u8; 8] = [0x8d, 0xef, 0xec, 0x86, 0xfa, 0x99, 0xaf, 0x7b];

const fn dual_basis_tables() -> ([u8; 256], [u8; 256]) {
    let mut to_dual = [0u8; 256];
    let mut from_dual = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut v = 0u8;
        let mut j = 0;
        while j < 8 {
            let mut k = 0;
            while k < 8 {
                if i & (1 << k) != 0 {
                    v ^= TAL[7 - k] & (1 << j);
                }
                k += 1;
            }
            j += 1;
        }
        to_dual[i] = v;
        from_dual[v as usize] = i as u8;
        i += 1;
    }
    (to_dual, from_dual)
}

const DUAL_BASIS: ([u8; 256], [u8; 256]) = dual_basis_tables();
/// Conventional to dual-basis symbol mapping.
pub const TO_DUAL: [u8; 256] = DUAL_BASIS.0;
/// Dual-basis to conventional symbol mapping.
pub const FROM_DUAL: [u8; 256] = DUAL_BASIS.1;

const fn gf_tables() -> ([u8; 256], [u8; 256]) {
    let mut alpha_to = [0u8; 256];
    let mut index_of = [0u8; 256];
    let mut sr: u16 = 1;
    let mut i = 0;
    while i < 255 {
        index_of[sr as usize] = i as u8;
        alpha_to[i] = sr as u8;
        sr <<= 1;
        if sr & 0x100 != 0 {
            sr ^= GF_POLY;
        }
        i += 1;
    }
    index_of[0] = A0;
    (alpha_to, index_of)
}

const GF: ([u8; 256], [u8; 256]) = gf_tables();
const ALPHA_TO: [u8; 256] = GF.0;
const INDEX_OF: [u8; 256] = GF.1;

const fn modnn(x: usize) -> usize {
    x % 255
}

/// Generator polynomial coefficients in index form.
const GENPOLY: [u8; PARITY_LEN + 1] = {
    let mut g = [0u8; PARITY_LEN + 1];
    g[0] = 1;
    let mut root = FCR * PRIM;
    let mut i = 0;
    while i < PARITY_LEN {
        g[i + 1] = 1;
        let mut j = i;
        while j > 0 {
            g[j] = if g[j] != 0 {
                g[j - 1] ^ ALPHA_TO[modnn(INDEX_OF[g[j] as usize] as usize + root)]
            } else {
                g[j - 1]
            };
            j -= 1;
        }
        g[0] = ALPHA_TO[modnn(INDEX_OF[g[0] as usize] as usize + root)];
        root += PRIM;
        i += 1;
    }
    let mut k = 0;
    while k <= PARITY_LEN {
        g[k] = INDEX_OF[g[k] as usize];
        k += 1;
    }
    g
};

fn conventional_parity(message: &[u8]) -> [u8; PARITY_LEN] {
    let mut bb = [0u8; PARITY_LEN];
    for &d in message {
        let fb = INDEX_OF[usize::from(d ^ bb[0])];
        if fb != A0 {
            for j in 1..PARITY_LEN {
                bb[j] ^= ALPHA_TO[modnn(usize::from(fb) + usize::from(GENPOLY[PARITY_LEN - j]))];
            }
        }
        bb.copy_within(1.., 0);
        bb[PARITY_LEN - 1] = if fb == A0 {
            0
        } else {
            ALPHA_TO[modnn(usize::from(fb) + usize::from(GENPOLY[0]))]
        };
    }
    bb
}

/// Encode a [K] byte message into a systematic codeword in the given representation.
///
/// # Panics
/// If `message` is not [K] bytes long.
#[must_use]
pub fn encode(message: &[u8], variant: RsVariant) -> [u8; N] {
    assert_eq!(message.len(), K, "message must be {K} bytes");
    let mut codeword = [0u8; N];
    codeword[..K].copy_from_slice(message);
    match variant {
        RsVariant::Conventional => {
            codeword[K..].copy_from_slice(&conventional_parity(message));
        }
        RsVariant::Ccsds => {
            let conventional: Vec<u8> = message
                .iter()
                .map(|b| FROM_DUAL[usize::from(*b)])
                .collect();
            let parity = conventional_parity(&conventional);
            for (dst, p) in codeword[K..].iter_mut().zip(parity) {
                *dst = TO_DUAL[usize::from(p)];
            }
        }
    }
    codeword
}

fn correct_dual(codeword: &mut [u8; N]) -> i32 {
    let zult = correct_message(&*codeword);
    let num_corrected = match zult.state {
        RSState::Uncorrectable(_) => return UNCORRECTABLE,
        RSState::Corrected(num) => i32::try_from(num).unwrap_or(i32::MAX),
        _ => 0,
    };
    if let Some(message) = zult.message {
        let len = message.len().min(N);
        codeword[..len].copy_from_slice(&message[..len]);
    }
    num_corrected
}

/// Reed-Solomon correction backed by [rs2].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultReedSolomon;

impl ReedSolomonDecoder for DefaultReedSolomon {
    fn decode(&mut self, codeword: &mut [u8; N], variant: RsVariant) -> i32 {
        match variant {
            RsVariant::Ccsds => correct_dual(codeword),
            RsVariant::Conventional => {
                let mut dual = [0u8; N];
                for (d, c) in dual.iter_mut().zip(codeword.iter()) {
                    *d = TO_DUAL[usize::from(*c)];
                }
                let zult = correct_dual(&mut dual);
                if zult != UNCORRECTABLE {
                    for (c, d) in codeword.iter_mut().zip(dual) {
                        *c = FROM_DUAL[usize::from(d)];
                    }
                }
                zult
            }
        }
    }
}
