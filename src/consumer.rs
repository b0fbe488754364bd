//! Consumer workers: drain batches from the queue and run the per-key
//! verification pipeline (index probes, optional self-check, vanity match,
//! hit logging).

use std::io;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, warn};

use crate::config::CompiledConfig;
use crate::crypto;
use crate::index::AddressIndex;
use crate::keys::PublicKeyBytes;
use crate::keyutil::{format_key_details, hash160_to_base58_address, secret_to_wif, Network};
use crate::queue::BatchQueue;
use crate::scanner::StopToken;
use crate::stats::Counters;

pub const HIT_PREFIX: &str = "hit: Found the address: ";
pub const MISS_PREFIX: &str = "miss: Could not find the address: ";
pub const VANITY_HIT_PREFIX: &str = "vanity pattern match: ";
pub const HIT_SAFE_PREFIX: &str = "hit: safe log: ";

const SELF_CHECK_PREFIX: &str = "self-check mismatch: ";

/// Sink for the stable scan records. The default routes to `tracing`;
/// tests swap in a collecting sink.
pub trait ScanOutput: Send + Sync {
    fn info(&self, line: &str);
    fn error(&self, line: &str);
    fn trace(&self, line: &str);
    /// Miss lines are only formatted when this returns true.
    fn trace_enabled(&self) -> bool;
}

/// Production sink: records become log events.
pub struct TracingOutput;

impl ScanOutput for TracingOutput {
    fn info(&self, line: &str) {
        tracing::info!("{}", line);
    }

    fn error(&self, line: &str) {
        tracing::error!("{}", line);
    }

    fn trace(&self, line: &str) {
        tracing::trace!("{}", line);
    }

    fn trace_enabled(&self) -> bool {
        tracing::enabled!(tracing::Level::TRACE)
    }
}

/// In-memory sink. Used by the scenario tests to assert on exact records.
#[derive(Default)]
pub struct CollectingOutput {
    lines: Mutex<Vec<String>>,
    trace_on: bool,
}

impl CollectingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            trace_on: true,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn count_with_prefix(&self, prefix: &str) -> usize {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.starts_with(prefix))
            .count()
    }
}

impl ScanOutput for CollectingOutput {
    fn info(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    fn error(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    fn trace(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    fn trace_enabled(&self) -> bool {
        self.trace_on
    }
}

/// Append-only findings file. Flushed per record so a crash after a hit
/// cannot lose it.
pub struct FindingsFile {
    file: Mutex<std::fs::File>,
}

impl FindingsFile {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn record(&self, address: &str, compressed: bool, entry: &PublicKeyBytes, network: Network) {
        use std::io::Write;

        let time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let form = if compressed { "compressed" } else { "uncompressed" };
        let wif = secret_to_wif(&entry.secret, compressed, network);

        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(
            file,
            "[{}] {} | {} | {} | {}",
            time,
            address,
            form,
            entry.secret.to_hex(),
            wif
        )
        .and_then(|_| file.sync_all())
        {
            warn!("failed to append to findings file: {}", e);
        }
    }
}

/// Per-pool settings lifted out of the full configuration.
#[derive(Clone)]
pub struct ConsumerSettings {
    pub threads: usize,
    pub delay_empty_consumer: Duration,
    pub runtime_check: bool,
    pub network: Network,
    pub vanity: Option<Regex>,
}

impl ConsumerSettings {
    pub fn from_config(compiled: &CompiledConfig) -> Self {
        Self {
            threads: compiled.config.threads,
            delay_empty_consumer: Duration::from_millis(compiled.config.delay_empty_consumer),
            runtime_check: compiled.config.runtime_public_key_calculation_check,
            network: compiled.config.network,
            vanity: compiled.vanity.clone(),
        }
    }
}

struct ConsumerShared {
    settings: ConsumerSettings,
    queue: BatchQueue,
    index: Arc<dyn AddressIndex>,
    counters: Arc<Counters>,
    output: Arc<dyn ScanOutput>,
    findings: Option<Arc<FindingsFile>>,
    stop: StopToken,
}

/// The pool of `T` worker threads sharing one queue and one index.
pub struct ConsumerPool {
    handles: Vec<JoinHandle<()>>,
}

impl ConsumerPool {
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        settings: ConsumerSettings,
        queue: BatchQueue,
        index: Arc<dyn AddressIndex>,
        counters: Arc<Counters>,
        output: Arc<dyn ScanOutput>,
        findings: Option<Arc<FindingsFile>>,
        stop: StopToken,
    ) -> Self {
        let shared = Arc::new(ConsumerShared {
            settings,
            queue,
            index,
            counters,
            output,
            findings,
            stop,
        });

        let handles = (0..shared.settings.threads)
            .map(|worker_id| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("consumer-{}", worker_id))
                    .spawn(move || worker_loop(&shared, worker_id))
                    .expect("failed to spawn consumer thread")
            })
            .collect();

        Self { handles }
    }

    /// Wait up to `timeout` for every worker to exit. Returns `false` when
    /// the deadline passed with workers still running (they are detached).
    pub fn join_with_timeout(self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.handles.iter().all(|h| h.is_finished()) {
                for handle in self.handles {
                    let _ = handle.join();
                }
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }
}

fn worker_loop(shared: &ConsumerShared, worker_id: usize) {
    debug!("consumer worker {} started", worker_id);

    while !shared.stop.is_stopped() {
        drain(shared);
        shared
            .counters
            .empty_consumer_rounds
            .fetch_add(1, Ordering::Relaxed);
        sleep_interruptible(shared.settings.delay_empty_consumer, &shared.stop);
    }

    // One last sweep so batches accepted before the stop are not abandoned.
    drain(shared);
    debug!("consumer worker {} exiting", worker_id);
}

/// Poll until the queue reads empty, processing whole batches in order.
fn drain(shared: &ConsumerShared) {
    while let Some(batch) = shared.queue.poll() {
        for entry in &batch {
            process_key(shared, entry);
        }
    }
}

fn sleep_interruptible(total: Duration, stop: &StopToken) {
    let deadline = Instant::now() + total;
    while !stop.is_stopped() {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        std::thread::sleep((deadline - now).min(Duration::from_millis(10)));
    }
}

/// The per-key pipeline. Order matters: probes, self-check, hit handling,
/// vanity, miss trace.
fn process_key(shared: &ConsumerShared, entry: &PublicKeyBytes) {
    if entry.invalid {
        return;
    }

    let contains_uncompressed = match probe(shared, &entry.hash160_uncompressed) {
        Ok(found) => found,
        Err(e) => {
            shared
                .output
                .error(&format!("address index probe failed: {}; key skipped", e));
            return;
        }
    };
    let contains_compressed = match probe(shared, &entry.hash160_compressed) {
        Ok(found) => found,
        Err(e) => {
            shared
                .output
                .error(&format!("address index probe failed: {}; key skipped", e));
            return;
        }
    };

    if shared.settings.runtime_check {
        self_check(shared, entry);
    }

    if contains_uncompressed {
        emit_hit(shared, entry, false);
    }
    if contains_compressed {
        emit_hit(shared, entry, true);
    }

    if let Some(vanity) = &shared.settings.vanity {
        check_vanity(shared, entry, vanity, false);
        check_vanity(shared, entry, vanity, true);
    }

    if !contains_uncompressed && !contains_compressed && shared.output.trace_enabled() {
        shared.output.trace(&format!(
            "{}{}",
            MISS_PREFIX,
            key_details(entry, false, shared.settings.network)
        ));
        shared.output.trace(&format!(
            "{}{}",
            MISS_PREFIX,
            key_details(entry, true, shared.settings.network)
        ));
    }
}

/// One membership query, timed into the probe-latency counter.
fn probe(shared: &ConsumerShared, hash160: &[u8; 20]) -> io::Result<bool> {
    let before = Instant::now();
    let result = shared.index.contains(hash160);
    let elapsed = before.elapsed().as_nanos() as u64;

    shared.counters.checked_keys.fetch_add(1, Ordering::Relaxed);
    shared
        .counters
        .checked_keys_time_to_contains_nanos
        .fetch_add(elapsed, Ordering::Relaxed);
    result
}

fn key_details(entry: &PublicKeyBytes, compressed: bool, network: Network) -> String {
    if compressed {
        format_key_details(
            &entry.secret,
            &entry.compressed,
            &entry.hash160_compressed,
            true,
            network,
        )
    } else {
        format_key_details(
            &entry.secret,
            &entry.uncompressed,
            &entry.hash160_uncompressed,
            false,
            network,
        )
    }
}

/// The raw secret goes out first so that nothing later in the pipeline can
/// lose a hit.
fn safe_log(shared: &ConsumerShared, entry: &PublicKeyBytes) {
    let output = &shared.output;
    output.info(&format!(
        "{}secret: {}",
        HIT_SAFE_PREFIX,
        entry.secret.to_decimal()
    ));
    output.info(&format!(
        "{}uncompressed: {}",
        HIT_SAFE_PREFIX,
        hex::encode(entry.uncompressed)
    ));
    output.info(&format!(
        "{}compressed: {}",
        HIT_SAFE_PREFIX,
        hex::encode(entry.compressed)
    ));
    output.info(&format!(
        "{}hash160 uncompressed: {}",
        HIT_SAFE_PREFIX,
        hex::encode(entry.hash160_uncompressed)
    ));
    output.info(&format!(
        "{}hash160 compressed: {}",
        HIT_SAFE_PREFIX,
        hex::encode(entry.hash160_compressed)
    ));
}

fn emit_hit(shared: &ConsumerShared, entry: &PublicKeyBytes, compressed: bool) {
    safe_log(shared, entry);
    shared.counters.hits.fetch_add(1, Ordering::Relaxed);
    shared.output.info(&format!(
        "{}{}",
        HIT_PREFIX,
        key_details(entry, compressed, shared.settings.network)
    ));

    if let Some(findings) = &shared.findings {
        let hash160 = if compressed {
            &entry.hash160_compressed
        } else {
            &entry.hash160_uncompressed
        };
        let address = hash160_to_base58_address(hash160, shared.settings.network);
        findings.record(&address, compressed, entry, shared.settings.network);
    }
}

fn check_vanity(shared: &ConsumerShared, entry: &PublicKeyBytes, vanity: &Regex, compressed: bool) {
    let hash160 = if compressed {
        &entry.hash160_compressed
    } else {
        &entry.hash160_uncompressed
    };
    let address = hash160_to_base58_address(hash160, shared.settings.network);
    if !vanity.is_match(&address) {
        return;
    }

    safe_log(shared, entry);
    shared.counters.vanity_hits.fetch_add(1, Ordering::Relaxed);
    shared.output.info(&format!(
        "{}{}",
        VANITY_HIT_PREFIX,
        key_details(entry, compressed, shared.settings.network)
    ));
}

/// Re-derive the key through the reference path and compare every byte
/// field. Mismatches are reported and never abort the search.
fn self_check(shared: &ConsumerShared, entry: &PublicKeyBytes) {
    let output = &shared.output;
    let Some(reference) = crypto::derive_reference(&entry.secret) else {
        output.error(&format!(
            "{}secret {} rejected by the reference library",
            SELF_CHECK_PREFIX,
            entry.secret.to_decimal()
        ));
        return;
    };

    if reference.hash160_uncompressed != entry.hash160_uncompressed {
        output.error(&format!("{}uncompressed", SELF_CHECK_PREFIX));
        output.error(&format!(
            "{}secret: {}",
            SELF_CHECK_PREFIX,
            entry.secret.to_decimal()
        ));
        output.error(&format!(
            "{}uncompressed: {}",
            SELF_CHECK_PREFIX,
            hex::encode(entry.uncompressed)
        ));
        output.error(&format!(
            "{}reference uncompressed: {}",
            SELF_CHECK_PREFIX,
            hex::encode(reference.uncompressed)
        ));
        output.error(&format!(
            "{}hash160 uncompressed: {}",
            SELF_CHECK_PREFIX,
            hex::encode(entry.hash160_uncompressed)
        ));
        output.error(&format!(
            "{}reference hash160 uncompressed: {}",
            SELF_CHECK_PREFIX,
            hex::encode(reference.hash160_uncompressed)
        ));
    }

    if reference.hash160_compressed != entry.hash160_compressed {
        output.error(&format!("{}compressed", SELF_CHECK_PREFIX));
        output.error(&format!(
            "{}secret: {}",
            SELF_CHECK_PREFIX,
            entry.secret.to_decimal()
        ));
        output.error(&format!(
            "{}compressed: {}",
            SELF_CHECK_PREFIX,
            hex::encode(entry.compressed)
        ));
        output.error(&format!(
            "{}reference compressed: {}",
            SELF_CHECK_PREFIX,
            hex::encode(reference.compressed)
        ));
        output.error(&format!(
            "{}hash160 compressed: {}",
            SELF_CHECK_PREFIX,
            hex::encode(entry.hash160_compressed)
        ));
        output.error(&format!(
            "{}reference hash160 compressed: {}",
            SELF_CHECK_PREFIX,
            hex::encode(reference.hash160_compressed)
        ));
    }
}
