use std::io::{self, Read};

use tracing::debug;

use crate::{
    primitives::{Correlation, Correlator},
    profile::{ProtocolProfile, SyncWord},
    source::FrameSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Correlating over the whole frame.
    Searching,
    /// Correlating over a reduced window at the start of the frame.
    Locked,
}

/// Result of tracking a single frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncResult {
    pub correlation: Correlation,
    pub sync_word: SyncWord,
    /// The correlation score reached the profile minimum.
    pub accepted: bool,
}

/// Flywheel synchronization tracker.
///
/// Starts in [SyncState::Searching]. A full correlation reaching the minimum score locks
/// the tracker, after which only the first `len / divisor` symbols are correlated. A
/// non-zero reduced-window offset triggers a full correlation and restarts the flywheel,
/// and every `recheck` cycles a full search is forced.
pub struct SyncTracker {
    words: Vec<SyncWord>,
    patterns: Vec<u64>,
    bits: usize,
    min_correlation: u32,
    recheck: u32,
    divisor: usize,
    state: SyncState,
    flywheel: u32,
}

impl SyncTracker {
    #[must_use]
    pub fn new(profile: &ProtocolProfile) -> Self {
        Self {
            words: profile.sync_words.clone(),
            patterns: profile.correlation_words(),
            bits: profile.sync_bits,
            min_correlation: profile.min_correlation,
            recheck: profile.flywheel_recheck,
            divisor: profile.lock_window_divisor.max(1),
            state: SyncState::Searching,
            flywheel: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state
    }

    #[must_use]
    pub fn flywheel(&self) -> u32 {
        self.flywheel
    }

    pub fn reset(&mut self) {
        self.state = SyncState::Searching;
        self.flywheel = 0;
    }

    /// Locate the sync word in `buffer` for this cycle.
    pub fn track(&mut self, correlator: &mut dyn Correlator, buffer: &[u8]) -> SyncResult {
        if self.flywheel >= self.recheck {
            self.state = SyncState::Searching;
            self.flywheel = 0;
        }

        let full = buffer.len();
        let correlation = match self.state {
            SyncState::Searching => correlator.correlate(buffer, full, &self.patterns, self.bits),
            SyncState::Locked => {
                let quick =
                    correlator.correlate(buffer, full / self.divisor, &self.patterns, self.bits);
                if quick.offset == 0 {
                    quick
                } else {
                    self.flywheel = 0;
                    correlator.correlate(buffer, full, &self.patterns, self.bits)
                }
            }
        };
        self.flywheel += 1;

        let accepted = correlation.score >= self.min_correlation;
        if accepted && self.state == SyncState::Searching {
            debug!(
                offset = correlation.offset,
                score = correlation.score,
                word = correlation.word,
                "sync acquired"
            );
            self.state = SyncState::Locked;
        }

        SyncResult {
            correlation,
            sync_word: self.words.get(correlation.word).copied().unwrap_or_default(),
            accepted,
        }
    }

    /// Report the FEC outcome of the frame just tracked. A corrupted frame drops the lock.
    pub fn frame_result(&mut self, corrupted: bool) {
        if corrupted && self.state == SyncState::Locked {
            debug!("frame uncorrectable; searching");
            self.state = SyncState::Searching;
        }
    }
}

/// Shift `buffer` left by `offset` symbols and refill the vacated end from `source`.
///
/// Returns the number of fresh symbols read, which is less than `offset` only at the end
/// of the stream.
///
/// # Errors
/// Any read error from `source`.
pub fn realign<R: Read>(
    buffer: &mut [u8],
    offset: usize,
    source: &mut FrameSource<R>,
) -> io::Result<usize> {
    if offset == 0 || offset >= buffer.len() {
        return Ok(0);
    }
    buffer.copy_within(offset.., 0);
    let start = buffer.len() - offset;
    source.fill(&mut buffer[start..])
}
