//! Non-blocking delivery of statistics snapshots and raw-sample previews.
//!
//! Every subscriber gets its own bounded queue. Publishing never blocks the decode loop:
//! when a queue is full the new message is dropped for that subscriber, and subscribers
//! whose receiver has been dropped are removed.
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::decoder::FrameStatistics;

/// Raw coded symbols from the start of a frame buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    /// Frames processed when the preview was taken.
    pub frame: u64,
    #[serde(with = "serde_bytes")]
    pub samples: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Telemetry {
    Statistics(FrameStatistics),
    Preview(Preview),
}

impl Telemetry {
    #[must_use]
    pub fn channel(&self) -> Channel {
        match self {
            Self::Statistics(_) => Channel::Statistics,
            Self::Preview(_) => Channel::Preview,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Statistics,
    Preview,
}

pub struct TelemetryHub {
    depth: usize,
    subscribers: Vec<(Channel, Sender<Telemetry>)>,
}

impl TelemetryHub {
    /// Create a hub whose subscriber queues hold at most `depth` messages.
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, channel: Channel) -> Receiver<Telemetry> {
        let (tx, rx) = bounded(self.depth);
        self.subscribers.push((channel, tx));
        rx
    }

    #[must_use]
    pub fn has_subscribers(&self, channel: Channel) -> bool {
        self.subscribers.iter().any(|(c, _)| *c == channel)
    }

    /// Offer `message` to every subscriber of its channel, returning the number of
    /// subscribers it was queued for.
    pub fn publish(&mut self, message: &Telemetry) -> usize {
        let channel = message.channel();
        let mut delivered = 0;
        self.subscribers.retain(|(c, tx)| {
            if *c != channel {
                return true;
            }
            match tx.try_send(message.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    trace!(?channel, "subscriber queue full; dropping message");
                    true
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!(?channel, "removing disconnected subscriber");
                    false
                }
            }
        });
        delivered
    }
}
