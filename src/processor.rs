//! Runs independent decode jobs on a worker pool.
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crossbeam::channel::{bounded, Receiver};
use threadpool::ThreadPool;
use tracing::{debug, info, warn};

use crate::{
    decoder::{CancelToken, Decoder, DecoderOptions, Summary},
    profile::Registry,
    sink::WriteSink,
    telemetry::{Channel, Telemetry},
    Error, Result,
};

/// A request to decode one input file into one output file.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Protocol profile key.
    pub protocol: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub options: DecoderOptions,
}

impl JobRequest {
    pub fn new<P, Q>(protocol: &str, input: P, output: Q) -> Self
    where
        P: Into<PathBuf>,
        Q: Into<PathBuf>,
    {
        Self {
            protocol: protocol.to_string(),
            input: input.into(),
            output: output.into(),
            options: DecoderOptions::default(),
        }
    }
}

/// Handle to a submitted decode job.
pub struct Job {
    pub id: u64,
    cancel: CancelToken,
    /// Statistics snapshots published by the job.
    pub statistics: Receiver<Telemetry>,
    /// Raw-sample previews published by the job.
    pub preview: Receiver<Telemetry>,
    result: Receiver<Result<Summary>>,
}

impl Job {
    /// Ask the job to stop after its current frame.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the job finishes.
    ///
    /// # Errors
    /// The decode error, or [Error::JobFailed] if the job ended without a result.
    pub fn wait(self) -> Result<Summary> {
        self.result.recv().map_err(|_| Error::JobFailed(self.id))?
    }
}

/// Multiple-job decode processor.
///
/// Each job owns its decoder state, so jobs share nothing except the profile registry.
pub struct Processor {
    registry: Arc<Registry>,
    pool: ThreadPool,
    next_id: AtomicU64,
}

impl Processor {
    /// Create a processor running at most `threads` jobs concurrently.
    #[must_use]
    pub fn new(registry: Arc<Registry>, threads: usize) -> Self {
        Self {
            registry,
            pool: ThreadPool::with_name("wxdecode".to_string(), threads.max(1)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Queue a decode job.
    ///
    /// # Errors
    /// [Error::UnknownProtocol] if the request names a protocol not in the registry. Nothing
    /// is queued in that case.
    pub fn submit(&self, request: JobRequest) -> Result<Job> {
        let profile = self.registry.get(&request.protocol)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let cancel = CancelToken::new();
        let mut decoder = Decoder::new(profile)
            .with_options(request.options.clone())
            .with_cancel_token(cancel.clone());
        let statistics = decoder.subscribe(Channel::Statistics);
        let preview = decoder.subscribe(Channel::Preview);
        let (result_tx, result_rx) = bounded(1);

        debug!(id, protocol = %request.protocol, input = ?request.input, "job queued");
        self.pool.execute(move || {
            info!(id, input = ?request.input, output = ?request.output, "job started");
            let zult = run(&mut decoder, &request);
            match &zult {
                Ok(summary) => info!(
                    id,
                    frames = summary.statistics.total_packets,
                    written = summary.records_written,
                    cancelled = summary.cancelled,
                    "job finished"
                ),
                Err(err) => warn!(id, "job failed: {err}"),
            }
            if result_tx.send(zult).is_err() {
                debug!(id, "job handle dropped before completion");
            }
        });

        Ok(Job {
            id,
            cancel,
            statistics,
            preview,
            result: result_rx,
        })
    }

    /// Number of jobs waiting for a worker.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.pool.queued_count()
    }

    /// Block until every submitted job has finished.
    pub fn join(&self) {
        self.pool.join();
    }
}

fn run(decoder: &mut Decoder, request: &JobRequest) -> Result<Summary> {
    let reader = File::open(&request.input).map_err(|source| Error::Open {
        path: request.input.clone(),
        source,
    })?;
    let writer = File::create(&request.output).map_err(|source| Error::Create {
        path: request.output.clone(),
        source,
    })?;
    let mut sink = WriteSink::new(BufWriter::new(writer));
    decoder.decode(BufReader::new(reader), &mut sink)
}
