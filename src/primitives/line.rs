use super::LineCoding;
use crate::profile::PhaseShift;

const fn pn_sequence() -> [u8; 255] {
    let mut seq = [0u8; 255];
    let mut state: u8 = 0xff;
    let mut i = 0;
    while i < 255 {
        let mut byte = 0u8;
        let mut k = 0;
        while k < 8 {
            byte = (byte << 1) | (state & 1);
            // x^8 + x^7 + x^5 + x^3 + 1
            let feedback = ((state & 0xa9).count_ones() & 1) as u8;
            state = (state >> 1) | (feedback << 7);
            k += 1;
        }
        seq[i] = byte;
        i += 1;
    }
    seq
}

/// CCSDS pseudo-randomizer sequence, repeating every 255 bytes.
pub const PN_SEQUENCE: [u8; 255] = pn_sequence();

/// XOR the first `len` bytes of `buffer` with [PN_SEQUENCE].
pub fn descramble(buffer: &mut [u8], len: usize) {
    for (b, pn) in buffer
        .iter_mut()
        .take(len)
        .zip(PN_SEQUENCE.iter().cycle())
    {
        *b ^= pn;
    }
}

/// NRZ-M decode the first `len` bytes of `buffer` in place, bits MSB first.
///
/// The bit preceding the buffer is taken to be zero.
pub fn differential_decode(buffer: &mut [u8], len: usize) {
    let mut last = 0u8;
    for b in buffer.iter_mut().take(len) {
        let cur = *b;
        *b = cur ^ ((cur >> 1) | (last << 7));
        last = cur & 1;
    }
}

/// Undo the phase rotation, then the I/Q swap, on the soft symbol pairs in the first
/// `len` bytes of `buffer`.
pub fn fix_phase_and_inversion(
    buffer: &mut [u8],
    len: usize,
    phase: PhaseShift,
    iq_inverted: bool,
) {
    if phase == PhaseShift::Deg0 && !iq_inverted {
        return;
    }
    let len = len.min(buffer.len());
    for pair in buffer[..len].chunks_exact_mut(2) {
        let (i, q) = match phase {
            PhaseShift::Deg0 => (pair[0], pair[1]),
            PhaseShift::Deg90 => (pair[1], !pair[0]),
            PhaseShift::Deg180 => (!pair[0], !pair[1]),
            PhaseShift::Deg270 => (!pair[1], pair[0]),
        };
        if iq_inverted {
            pair[0] = q;
            pair[1] = i;
        } else {
            pair[0] = i;
            pair[1] = q;
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLineCoding;

impl LineCoding for DefaultLineCoding {
    fn descramble(&self, buffer: &mut [u8], len: usize) {
        descramble(buffer, len);
    }

    fn differential_decode(&self, buffer: &mut [u8], len: usize) {
        differential_decode(buffer, len);
    }

    fn fix_phase_and_inversion(
        &self,
        buffer: &mut [u8],
        len: usize,
        phase: PhaseShift,
        iq_inverted: bool,
    ) {
        fix_phase_and_inversion(buffer, len, phase, iq_inverted);
    }
}
