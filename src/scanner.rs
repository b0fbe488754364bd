//! Wiring and lifecycle: one stop token, consumer pool first, producers on
//! top, stats alongside, and an ordered shutdown that drains before it
//! drops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, RecvTimeoutError};
use tracing::{info, warn};

use crate::config::CompiledConfig;
use crate::consumer::{ConsumerPool, ConsumerSettings, FindingsFile, ScanOutput, TracingOutput};
use crate::error::Result;
use crate::index::AddressIndex;
use crate::producer::{BatchStrategy, CpuGridKernel, KernelStrategy, Producer, ScalarStrategy};
use crate::queue::BatchQueue;
use crate::secrets::{RandomSecrets, SecretSource, SecretsFile};
use crate::stats::{Counters, StatsReporter};

/// The sole cancellation channel: one shared atomic flag observed by every
/// long-running loop.
#[derive(Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counter snapshot returned after a run has fully shut down.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub checked_keys: u64,
    pub hits: u64,
    pub vanity_hits: u64,
    pub empty_consumer_rounds: u64,
    pub drained: bool,
}

/// Orchestrator for one search run.
pub struct Scanner {
    compiled: CompiledConfig,
    index: Arc<dyn AddressIndex>,
    output: Arc<dyn ScanOutput>,
}

impl Scanner {
    pub fn new(compiled: CompiledConfig, index: Arc<dyn AddressIndex>) -> Self {
        Self::with_output(compiled, index, Arc::new(TracingOutput))
    }

    /// Same scanner with a custom record sink, used by the scenario tests.
    pub fn with_output(
        compiled: CompiledConfig,
        index: Arc<dyn AddressIndex>,
        output: Arc<dyn ScanOutput>,
    ) -> Self {
        Self {
            compiled,
            index,
            output,
        }
    }

    /// Run until the stop token rises or every producer finishes. Blocks the
    /// calling thread; returns after shutdown has drained or timed out.
    pub fn run(&self, stop: StopToken) -> Result<ScanSummary> {
        let config = &self.compiled.config;
        let counters = Counters::new();
        let queue = BatchQueue::with_capacity(config.queue_size);

        let findings = if config.findings_file.as_os_str().is_empty() {
            None
        } else {
            Some(Arc::new(FindingsFile::open(&config.findings_file)?))
        };

        // Sources are opened before any thread starts so a bad path fails
        // the run instead of a worker.
        let producer_count = self.producer_count();
        let mut sources: Vec<Box<dyn SecretSource>> = Vec::with_capacity(producer_count);
        for _ in 0..producer_count {
            sources.push(self.open_source(&stop)?);
        }

        // Consumers first: the queue must have takers before the first
        // batch lands.
        let pool = ConsumerPool::start(
            ConsumerSettings::from_config(&self.compiled),
            queue.clone(),
            Arc::clone(&self.index),
            Arc::clone(&counters),
            Arc::clone(&self.output),
            findings,
            stop.clone(),
        );

        let (done_tx, done_rx) = unbounded();
        let mut producer_handles = Vec::with_capacity(producer_count);
        for source in sources {
            let strategy = self.strategy();
            let producer = Producer::new(
                config.grid_num_bits,
                self.compiled.kill_mask,
                config.run_once,
                config.log_secret_base,
                source,
                strategy,
                queue.clone(),
                stop.clone(),
                done_tx.clone(),
            );
            producer_handles.push(
                std::thread::Builder::new()
                    .name(format!("producer-{}", producer_handles.len()))
                    .spawn(move || producer.run())
                    .expect("failed to spawn producer thread"),
            );
        }
        drop(done_tx);

        let reporter = StatsReporter::start(
            Duration::from_secs(config.print_statistics_every_n_seconds),
            Arc::clone(&counters),
            queue.clone(),
            stop.clone(),
        );

        // Block until cancellation or natural exhaustion of all producers.
        let mut completed = 0usize;
        while !stop.is_stopped() && completed < producer_count {
            match done_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(()) => completed += 1,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // Ordered shutdown: flag up, producers out, consumers drain, stats
        // last.
        stop.stop();
        for handle in producer_handles {
            let _ = handle.join();
        }

        let await_queue_empty = Duration::from_secs(config.await_queue_empty_seconds);
        let drained = pool.join_with_timeout(await_queue_empty);
        if drained {
            info!("consumer pool drained and terminated");
        } else {
            warn!(
                "shutdown exceeded awaitQueueEmpty ({}s); dropping {} unprocessed batches",
                config.await_queue_empty_seconds,
                queue.len()
            );
        }

        reporter.join();
        let summary = ScanSummary {
            checked_keys: counters.checked_keys(),
            hits: counters.hits(),
            vanity_hits: counters.vanity_hits(),
            empty_consumer_rounds: counters.empty_consumer_rounds.load(Ordering::Relaxed),
            drained,
        };
        info!(
            "scan finished: {} keys checked, {} hits, {} vanity hits",
            summary.checked_keys, summary.hits, summary.vanity_hits
        );
        Ok(summary)
    }

    /// A secrets file is owned by exactly one producer; the PRNG scales to
    /// the configured pool.
    fn producer_count(&self) -> usize {
        let config = &self.compiled.config;
        if config.secrets_file.is_some() && config.producers > 1 {
            warn!(
                "secrets file is read by a single producer; ignoring producers = {}",
                config.producers
            );
            return 1;
        }
        config.producers
    }

    fn open_source(&self, stop: &StopToken) -> Result<Box<dyn SecretSource>> {
        let config = &self.compiled.config;
        match &config.secrets_file {
            Some(path) => Ok(Box::new(SecretsFile::open(
                path,
                config.secret_format,
                config.network,
                stop.clone(),
            )?)),
            None => Ok(Box::new(RandomSecrets::new(stop.clone()))),
        }
    }

    fn strategy(&self) -> Box<dyn BatchStrategy> {
        if self.compiled.config.batched_expansion {
            Box::new(KernelStrategy::new(CpuGridKernel))
        } else {
            Box::new(ScalarStrategy)
        }
    }
}
