use crate::{primitives::LineCoding, profile::ProtocolProfile};

/// Removes line coding from a decoded frame and strips its sync word.
///
/// After [LineDecodeStage::decode] the frame starts with the interleaved Reed-Solomon code
/// block.
pub struct LineDecodeStage {
    differential: bool,
    frame_size: usize,
    sync_word: Vec<u8>,
}

impl LineDecodeStage {
    #[must_use]
    pub fn new(profile: &ProtocolProfile) -> Self {
        Self {
            differential: profile.differential,
            frame_size: profile.frame_size,
            sync_word: vec![0u8; profile.sync_word_size],
        }
    }

    /// Sync word bytes of the last decoded frame.
    #[must_use]
    pub fn sync_word(&self) -> &[u8] {
        &self.sync_word
    }

    pub fn decode(&mut self, coding: &dyn LineCoding, frame: &mut [u8]) {
        let sync_len = self.sync_word.len();
        if self.differential {
            coding.differential_decode(frame, self.frame_size);
        }
        self.sync_word.copy_from_slice(&frame[..sync_len]);
        frame.copy_within(sync_len..self.frame_size, 0);
        coding.descramble(frame, self.frame_size - sync_len);
    }
}
