use super::FrameHeader;

const CHANNELS: usize = 256;

/// Bookkeeping for a single virtual channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelState {
    /// Counter of the last accepted frame.
    pub last: Option<u32>,
    pub received: u64,
    pub lost: u64,
}

impl ChannelState {
    /// Last accepted counter, -1 if none has been seen.
    #[must_use]
    pub fn last_counter(&self) -> i64 {
        self.last.map_or(-1, i64::from)
    }
}

/// Detects missing frames from per-channel frame counters.
///
/// Only forward gaps count as loss. A counter that repeats or goes backwards, such as a
/// 24-bit wrap or a spacecraft reset, restarts tracking from the new value.
#[derive(Debug, Clone)]
pub struct ContinuityTracker {
    channels: Vec<ChannelState>,
    lost: u64,
}

impl Default for ContinuityTracker {
    fn default() -> Self {
        Self {
            channels: vec![ChannelState::default(); CHANNELS],
            lost: 0,
        }
    }
}

impl ContinuityTracker {
    /// Record an accepted frame, returning the number of frames found missing before it.
    pub fn update(&mut self, header: &FrameHeader) -> u64 {
        let channel = &mut self.channels[usize::from(header.vcid)];
        let mut gap = 0;
        if let Some(prev) = channel.last {
            let delta = i64::from(header.counter) - i64::from(prev) - 1;
            if delta > 0 {
                gap = delta.unsigned_abs();
            }
        }
        channel.lost += gap;
        channel.last = Some(header.counter);
        channel.received += 1;
        self.lost += gap;
        gap
    }

    #[must_use]
    pub fn channel(&self, vcid: u8) -> &ChannelState {
        &self.channels[usize::from(vcid)]
    }

    /// Total frames lost over all channels.
    #[must_use]
    pub fn lost(&self) -> u64 {
        self.lost
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChannelState> {
        self.channels.iter()
    }
}
