use serde::{Deserialize, Serialize};

use super::{ContinuityTracker, FrameHeader};
use crate::{primitives::ViterbiResult, profile::ProtocolProfile};

/// Decoder telemetry snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FrameStatistics {
    /// Input bytes consumed.
    pub total_bytes_read: u64,
    /// Frames that passed correlation.
    pub total_packets: u64,
    /// Frames that failed correlation.
    pub unsynced_frames: u64,
    /// Frames with every Reed-Solomon block uncorrectable.
    pub dropped_packets: u64,
    pub lost_packets: u64,
    pub lost_packets_per_channel: Vec<u64>,
    pub received_packets_per_channel: Vec<u64>,
    #[serde(rename = "AverageRSCorrections")]
    pub average_rs_corrections: f32,
    pub average_vit_corrections: f32,
    /// Bit errors of the last frame.
    pub vit_errors: u32,
    /// Per-block Reed-Solomon results of the last frame, -1 being uncorrectable.
    pub rs_errors: Vec<i32>,
    pub signal_quality: u8,
    pub sync_correlation: u32,
    #[serde(rename = "SCID")]
    pub scid: u8,
    #[serde(rename = "VCID")]
    pub vcid: u8,
    pub packet_number: u32,
    pub frame_bits: usize,
    pub sync_word: Vec<u8>,
    pub frame_lock: bool,
}

/// Map a percent bit error rate to a 0-100 quality score.
#[must_use]
pub fn signal_quality(percent_ber: f32, corrupted: bool) -> u8 {
    let quality = 100.0 - percent_ber * 10.0;
    if corrupted || !(0.0..=100.0).contains(&quality) {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let quality = quality as u8;
    quality
}

/// Per-frame inputs to the [StatisticsAggregator].
#[derive(Debug, Clone, Copy)]
pub struct FrameReport<'a> {
    pub viterbi: ViterbiResult,
    pub rs_results: &'a [i32],
    pub corrupted: bool,
    pub correlation: u32,
    pub header: FrameHeader,
    pub sync_word: &'a [u8],
}

/// Accumulates frame results into a [FrameStatistics].
///
/// Averages cover a window of `N` frames. At the frame completing a window the average is
/// the window sum over `N` and the sums are re-seeded with that frame's values; otherwise
/// the sums are divided by the number of frames into the current window.
#[derive(Debug, Clone)]
pub struct StatisticsAggregator {
    window: u64,
    blocks: u64,
    vit_sum: u64,
    rs_sum: u64,
    stats: FrameStatistics,
}

impl StatisticsAggregator {
    #[must_use]
    pub fn new(profile: &ProtocolProfile) -> Self {
        Self {
            window: profile.average_window.max(1),
            blocks: (profile.rs_blocks as u64).max(1),
            vit_sum: 0,
            rs_sum: 0,
            stats: FrameStatistics {
                rs_errors: vec![0; profile.rs_blocks],
                frame_bits: profile.frame_bits,
                sync_word: vec![0; profile.sync_word_size],
                ..Default::default()
            },
        }
    }

    pub fn set_bytes_read(&mut self, total: u64) {
        self.stats.total_bytes_read = total;
    }

    /// Record a frame whose correlation fell below the minimum.
    pub fn record_unsynced(&mut self, correlation: u32) {
        self.stats.unsynced_frames += 1;
        self.stats.sync_correlation = correlation;
    }

    /// Record a frame that passed correlation and went through FEC.
    #[allow(clippy::cast_precision_loss)]
    pub fn record(&mut self, report: &FrameReport) {
        let stats = &mut self.stats;
        stats.total_packets += 1;

        let bit_errors = u64::from(report.viterbi.bit_errors);
        let corrections: u64 = report
            .rs_results
            .iter()
            .filter(|r| **r >= 0)
            .map(|r| u64::from(r.unsigned_abs()))
            .sum();
        self.vit_sum += bit_errors;
        self.rs_sum += corrections;

        let position = stats.total_packets % self.window;
        let divisor = if position == 0 { self.window } else { position };
        let average_vit = self.vit_sum as f32 / divisor as f32;
        let average_rs = self.rs_sum as f32 / (divisor * self.blocks) as f32;
        if position == 0 {
            self.vit_sum = bit_errors;
            self.rs_sum = corrections;
        }

        if report.corrupted {
            stats.dropped_packets += 1;
            stats.frame_lock = false;
        } else {
            stats.average_vit_corrections = average_vit;
            stats.average_rs_corrections = average_rs;
            stats.frame_lock = true;
        }

        let len = stats.rs_errors.len().min(report.rs_results.len());
        stats.rs_errors[..len].copy_from_slice(&report.rs_results[..len]);
        let len = stats.sync_word.len().min(report.sync_word.len());
        stats.sync_word[..len].copy_from_slice(&report.sync_word[..len]);

        stats.vit_errors = report.viterbi.bit_errors;
        stats.signal_quality = signal_quality(report.viterbi.percent_ber, report.corrupted);
        stats.sync_correlation = report.correlation;
        stats.scid = report.header.scid;
        stats.vcid = report.header.vcid;
        stats.packet_number = report.header.counter;
    }

    #[must_use]
    pub fn total_packets(&self) -> u64 {
        self.stats.total_packets
    }

    /// Current statistics including the loss and reception counts from `continuity`.
    #[must_use]
    pub fn snapshot(&self, continuity: &ContinuityTracker) -> FrameStatistics {
        let mut stats = self.stats.clone();
        stats.lost_packets = continuity.lost();
        stats.lost_packets_per_channel = continuity.channels().map(|c| c.lost).collect();
        stats.received_packets_per_channel = continuity.channels().map(|c| c.received).collect();
        stats
    }
}
