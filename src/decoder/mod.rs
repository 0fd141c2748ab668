//! The per-protocol frame decoding pipeline.
//!
//! Each iteration reads one coded frame and runs it through synchronization,
//! realignment, phase correction, convolutional decoding, line decoding, Reed-Solomon
//! correction and header extraction, in that order. Frames that survive FEC are written to
//! a [Sink].
use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read},
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crossbeam::channel::Receiver;
use tracing::{debug, error, info, span, trace, Level};
use typed_builder::TypedBuilder;

mod continuity;
mod convolution;
mod fec;
mod header;
mod line;
mod stats;
mod sync;

pub use continuity::{ChannelState, ContinuityTracker};
pub use convolution::{ConvolutionalStage, NEUTRAL};
pub use fec::{FecOutcome, FecStage};
pub use header::FrameHeader;
pub use line::LineDecodeStage;
pub use stats::{signal_quality, FrameReport, FrameStatistics, StatisticsAggregator};
pub use sync::{realign, SyncResult, SyncState, SyncTracker};

use crate::{
    primitives::{
        ConvolutionalDecoder, Correlator, DefaultCorrelator, DefaultLineCoding,
        DefaultReedSolomon, LineCoding, ReedSolomonDecoder, Viterbi27,
    },
    profile::ProtocolProfile,
    sink::{Sink, WriteSink},
    source::FrameSource,
    telemetry::{Channel, Preview, Telemetry, TelemetryHub},
    Error, Result,
};

/// Cooperative stop signal, checked once per frame.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct DecoderOptions {
    /// Frames between statistics and preview publications.
    #[builder(default = 32)]
    pub telemetry_interval: u64,
    /// Coded symbols included in each preview.
    #[builder(default = 512)]
    pub preview_len: usize,
    /// Messages each telemetry subscriber may have queued before new ones are dropped.
    #[builder(default = 16)]
    pub queue_depth: usize,
    /// Frames between progress log messages.
    #[builder(default = 512)]
    pub progress_interval: u64,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Outcome of a completed decode.
#[derive(Debug)]
pub struct Summary {
    pub statistics: FrameStatistics,
    /// Payload records written to the sink.
    pub records_written: u64,
    /// The decode stopped because its [CancelToken] was cancelled.
    pub cancelled: bool,
    /// Read error, other than end of stream, that ended the decode.
    pub read_error: Option<io::Error>,
}

/// Decodes a coded symbol stream into frame payloads for a single protocol.
///
/// Decoding state is created fresh for every call to [Decoder::decode], so the same input
/// always produces the same output.
///
/// # Examples
/// ```no_run
/// use wxdecode::{Decoder, Registry};
///
/// let profile = Registry::default().get("hrd").unwrap();
/// let input = std::fs::File::open("hrd.s").unwrap();
/// let mut payloads: Vec<Vec<u8>> = Vec::new();
/// let summary = Decoder::new(profile).decode(input, &mut payloads).unwrap();
/// assert_eq!(summary.records_written as usize, payloads.len());
/// ```
pub struct Decoder {
    profile: Arc<ProtocolProfile>,
    options: DecoderOptions,
    correlator: Box<dyn Correlator>,
    convolutional: Box<dyn ConvolutionalDecoder>,
    reed_solomon: Box<dyn ReedSolomonDecoder>,
    line_coding: Box<dyn LineCoding>,
    cancel: CancelToken,
    telemetry: TelemetryHub,
}

impl Decoder {
    /// Create a decoder for `profile` using the default primitives.
    #[must_use]
    pub fn new(profile: Arc<ProtocolProfile>) -> Self {
        let options = DecoderOptions::default();
        Self {
            profile,
            telemetry: TelemetryHub::new(options.queue_depth),
            options,
            correlator: Box::new(DefaultCorrelator),
            convolutional: Box::new(Viterbi27::new()),
            reed_solomon: Box::new(DefaultReedSolomon),
            line_coding: Box::new(DefaultLineCoding),
            cancel: CancelToken::new(),
        }
    }

    /// Set options. This replaces the telemetry hub, dropping existing subscribers.
    #[must_use]
    pub fn with_options(mut self, options: DecoderOptions) -> Self {
        self.telemetry = TelemetryHub::new(options.queue_depth);
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_correlator(mut self, correlator: Box<dyn Correlator>) -> Self {
        self.correlator = correlator;
        self
    }

    #[must_use]
    pub fn with_convolutional(mut self, decoder: Box<dyn ConvolutionalDecoder>) -> Self {
        self.convolutional = decoder;
        self
    }

    #[must_use]
    pub fn with_reed_solomon(mut self, decoder: Box<dyn ReedSolomonDecoder>) -> Self {
        self.reed_solomon = decoder;
        self
    }

    #[must_use]
    pub fn with_line_coding(mut self, coding: Box<dyn LineCoding>) -> Self {
        self.line_coding = coding;
        self
    }

    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn profile(&self) -> &ProtocolProfile {
        &self.profile
    }

    /// A handle that may be used to stop this decoder from another thread.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Subscribe to statistics snapshots or raw-sample previews.
    ///
    /// Messages are offered every `telemetry_interval` frames, and a final statistics
    /// snapshot when a decode ends. A subscriber that falls behind misses messages; it
    /// never slows the decode.
    pub fn subscribe(&mut self, channel: Channel) -> Receiver<Telemetry> {
        self.telemetry.subscribe(channel)
    }

    /// Decode `input` into `output`, replacing any existing output file.
    ///
    /// # Errors
    /// [Error::Open] or [Error::Create] if the files cannot be opened, otherwise as for
    /// [Decoder::decode].
    pub fn decode_file<P, Q>(&mut self, input: P, output: Q) -> Result<Summary>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let input = input.as_ref();
        let output = output.as_ref();
        let reader = File::open(input).map_err(|source| Error::Open {
            path: input.to_path_buf(),
            source,
        })?;
        let writer = File::create(output).map_err(|source| Error::Create {
            path: output.to_path_buf(),
            source,
        })?;
        let mut sink = WriteSink::new(BufWriter::new(writer));
        self.decode(BufReader::new(reader), &mut sink)
    }

    /// Decode every frame from `reader`, writing accepted payloads to `sink`.
    ///
    /// The decode ends without error at the end of the stream or when cancelled. A read
    /// error also ends the decode, and is reported in [Summary::read_error].
    ///
    /// # Errors
    /// [Error::Io] if writing to `sink` fails.
    pub fn decode<R, S>(&mut self, reader: R, sink: &mut S) -> Result<Summary>
    where
        R: Read,
        S: Sink + ?Sized,
    {
        let profile = Arc::clone(&self.profile);
        let mut source = FrameSource::new(reader, profile.input);
        let mut sync = SyncTracker::new(&profile);
        let mut convolution = ConvolutionalStage::new(&profile);
        let mut line = LineDecodeStage::new(&profile);
        let mut fec = FecStage::new(&profile);
        let mut continuity = ContinuityTracker::default();
        let mut stats = StatisticsAggregator::new(&profile);

        let mut coded = vec![0u8; profile.coded_frame_size];
        let mut decoded = vec![0u8; profile.frame_size];
        let mut corrected = vec![0u8; profile.frame_size];
        let codeblock_size = profile.codeblock_size();
        let payload_size = profile.payload_size();
        let telemetry_interval = self.options.telemetry_interval.max(1);
        let progress_interval = self.options.progress_interval.max(1);

        let mut records_written = 0u64;
        let mut cancelled = false;
        let mut read_error = None;

        info!(protocol = %profile.key, "starting decode");
        loop {
            if self.cancel.is_cancelled() {
                info!("decode cancelled");
                cancelled = true;
                break;
            }

            match source.fill(&mut coded) {
                Ok(n) if n == coded.len() => {}
                Ok(_) => break,
                Err(err) => {
                    error!("failed to read frame: {err}");
                    read_error = Some(err);
                    break;
                }
            }
            stats.set_bytes_read(source.bytes_read());

            let result = sync.track(self.correlator.as_mut(), &coded);
            if !result.accepted {
                debug!(
                    score = result.correlation.score,
                    minimum = profile.min_correlation,
                    "not enough correlation; skipping frame"
                );
                stats.record_unsynced(result.correlation.score);
                continue;
            }

            let offset = result.correlation.offset;
            if offset != 0 {
                match realign(&mut coded, offset, &mut source) {
                    Ok(n) if n == offset => {}
                    Ok(_) => break,
                    Err(err) => {
                        error!("failed to read realignment symbols: {err}");
                        read_error = Some(err);
                        break;
                    }
                }
                stats.set_bytes_read(source.bytes_read());
            }

            let word = result.sync_word;
            let len = coded.len();
            self.line_coding
                .fix_phase_and_inversion(&mut coded, len, word.phase, word.iq_inverted);
            let viterbi = convolution.decode(self.convolutional.as_mut(), &coded, &mut decoded);
            line.decode(self.line_coding.as_ref(), &mut decoded);
            let outcome = fec.correct(
                self.reed_solomon.as_mut(),
                &decoded[..codeblock_size],
                &mut corrected,
            );
            sync.frame_result(outcome.corrupted);

            let header = FrameHeader::decode(&corrected).unwrap_or_default();
            let span = span!(
                Level::TRACE,
                "frame",
                scid = header.scid,
                vcid = header.vcid,
                counter = header.counter
            );
            let _guard = span.enter();

            stats.record(&FrameReport {
                viterbi,
                rs_results: fec.block_results(),
                corrupted: outcome.corrupted,
                correlation: result.correlation.score,
                header,
                sync_word: line.sync_word(),
            });

            if outcome.corrupted {
                debug!(rs = ?fec.block_results(), "frame uncorrectable; dropping");
            } else {
                let missing = continuity.update(&header);
                if missing > 0 {
                    debug!(missing, "frames missing");
                }
                sink.write_record(&corrected[..payload_size])?;
                records_written += 1;
            }
            trace!(
                offset,
                score = result.correlation.score,
                bit_errors = viterbi.bit_errors,
                corrections = outcome.corrections,
                "frame decoded"
            );

            let processed = stats.total_packets();
            if processed % telemetry_interval == 0 {
                self.publish(&stats, &continuity, &coded, processed);
            }
            if processed % progress_interval == 0 {
                info!(
                    frames = processed,
                    dropped = stats.snapshot(&continuity).dropped_packets,
                    written = records_written,
                    "decode progress"
                );
            }
        }

        sink.flush()?;

        let statistics = stats.snapshot(&continuity);
        if self.telemetry.has_subscribers(Channel::Statistics) {
            self.telemetry
                .publish(&Telemetry::Statistics(statistics.clone()));
        }
        info!(
            frames = statistics.total_packets,
            dropped = statistics.dropped_packets,
            lost = statistics.lost_packets,
            written = records_written,
            "decode finished"
        );

        Ok(Summary {
            statistics,
            records_written,
            cancelled,
            read_error,
        })
    }

    fn publish(
        &mut self,
        stats: &StatisticsAggregator,
        continuity: &ContinuityTracker,
        coded: &[u8],
        processed: u64,
    ) {
        if self.telemetry.has_subscribers(Channel::Statistics) {
            self.telemetry
                .publish(&Telemetry::Statistics(stats.snapshot(continuity)));
        }
        if self.telemetry.has_subscribers(Channel::Preview) {
            let len = self.options.preview_len.min(coded.len());
            self.telemetry.publish(&Telemetry::Preview(Preview {
                frame: processed,
                samples: coded[..len].to_vec(),
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::Registry;

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let decoder = Decoder::new(Registry::default().get("lrpt").unwrap())
            .with_cancel_token(token.clone());
        assert!(!decoder.cancel_token().is_cancelled());
        token.cancel();
        assert!(decoder.cancel_token().is_cancelled());
    }

    #[test]
    fn empty_input() {
        let mut decoder = Decoder::new(Registry::default().get("lrpt").unwrap());
        let mut sink: Vec<Vec<u8>> = Vec::new();
        let summary = decoder.decode(Cursor::new(Vec::new()), &mut sink).unwrap();
        assert_eq!(summary.records_written, 0);
        assert_eq!(summary.statistics.total_packets, 0);
        assert!(!summary.cancelled);
        assert!(summary.read_error.is_none());
    }

    #[test]
    fn noise_is_not_synced() {
        let profile = Registry::default().get("hrd-cadu").unwrap();
        let mut decoder = Decoder::new(profile.clone());
        let mut sink: Vec<Vec<u8>> = Vec::new();
        // all zero bits correlate poorly with both sync words
        let input = vec![0u8; profile.frame_size * 3];
        let summary = decoder.decode(Cursor::new(input), &mut sink).unwrap();
        assert!(sink.is_empty());
        assert_eq!(summary.statistics.unsynced_frames, 3);
        assert_eq!(summary.statistics.total_bytes_read, 3 * 1024);
    }

    #[test]
    fn default_options() {
        let options = DecoderOptions::default();
        assert_eq!(options.telemetry_interval, 32);
        assert_eq!(options.preview_len, 512);
    }
}
