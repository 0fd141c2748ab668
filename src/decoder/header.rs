use serde::{Deserialize, Serialize};

/// Transfer frame primary header fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub scid: u8,
    pub vcid: u8,
    /// 24-bit virtual channel frame counter.
    pub counter: u32,
}

impl FrameHeader {
    /// Bytes required to decode a header.
    pub const LEN: usize = 6;

    /// Decode the header at the start of `dat`, or `None` if there are not enough bytes.
    #[must_use]
    pub fn decode(dat: &[u8]) -> Option<Self> {
        if dat.len() < Self::LEN {
            return None;
        }
        let word = u32::from_le_bytes([dat[2], dat[3], dat[4], dat[5]]);
        Some(Self {
            scid: ((dat[0] & 0x3f) << 2) | (dat[1] >> 6),
            vcid: dat[1] & 0x3f,
            counter: (word.swap_bytes() & 0xffff_ff00) >> 8,
        })
    }
}
