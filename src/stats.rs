//! Process-wide counters and the periodic throughput report.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::info;

use crate::queue::BatchQueue;
use crate::scanner::StopToken;

/// Monotonic counters, written from many threads; the reporter only needs
/// eventual consistency, so all accesses are relaxed.
#[derive(Default)]
pub struct Counters {
    pub checked_keys: AtomicU64,
    pub checked_keys_time_to_contains_nanos: AtomicU64,
    pub empty_consumer_rounds: AtomicU64,
    pub hits: AtomicU64,
    pub vanity_hits: AtomicU64,
}

impl Counters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn vanity_hits(&self) -> u64 {
        self.vanity_hits.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn checked_keys(&self) -> u64 {
        self.checked_keys.load(Ordering::Relaxed)
    }
}

/// One report line from a counter snapshot.
pub fn statistics_message(uptime: Duration, counters: &Counters, queue_depth: usize) -> String {
    let checked = counters.checked_keys.load(Ordering::Relaxed);
    let contains_nanos = counters
        .checked_keys_time_to_contains_nanos
        .load(Ordering::Relaxed);
    let empty_rounds = counters.empty_consumer_rounds.load(Ordering::Relaxed);
    let hits = counters.hits.load(Ordering::Relaxed);
    let vanity_hits = counters.vanity_hits.load(Ordering::Relaxed);

    let uptime_secs = uptime.as_secs_f64().max(0.001);
    let keys_per_sec = checked as f64 / uptime_secs;
    let avg_contains_micros = if checked > 0 {
        contains_nanos as f64 / checked as f64 / 1_000.0
    } else {
        0.0
    };

    format!(
        "uptime {} | {} keys checked ({}) | avg contains {:.2}us | queue depth {} | empty rounds {} | hits {} | vanity hits {}",
        format_time(uptime_secs),
        format_num(checked),
        format_speed(keys_per_sec),
        avg_contains_micros,
        queue_depth,
        format_num(empty_rounds),
        hits,
        vanity_hits,
    )
}

/// Periodic reporter on its own thread. Reads atomics and the advisory
/// queue depth only, so it can never block a worker.
pub struct StatsReporter {
    handle: Option<JoinHandle<()>>,
}

impl StatsReporter {
    pub fn start(
        period: Duration,
        counters: Arc<Counters>,
        queue: BatchQueue,
        stop: StopToken,
    ) -> Self {
        let handle = std::thread::Builder::new()
            .name("stats".into())
            .spawn(move || {
                let started = Instant::now();
                let mut next_tick = started + period;
                while !stop.is_stopped() {
                    std::thread::sleep(Duration::from_millis(100));
                    if Instant::now() < next_tick {
                        continue;
                    }
                    next_tick += period;
                    info!("{}", statistics_message(started.elapsed(), &counters, queue.len()));
                }
            })
            .expect("failed to spawn stats thread");

        Self {
            handle: Some(handle),
        }
    }

    /// Wait for the reporter to observe the stop token and exit.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Thousands-grouped decimal, e.g. `1,234,567`.
pub fn format_num(n: u64) -> String {
    let digits = n.to_string();
    let groups: Vec<String> = digits
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect();
    groups.join(",")
}

/// Key throughput with an SI unit prefix.
pub fn format_speed(per_sec: f64) -> String {
    match per_sec {
        s if s >= 1e9 => format!("{:.2} Gkeys/s", s / 1e9),
        s if s >= 1e6 => format!("{:.2} Mkeys/s", s / 1e6),
        s if s >= 1e3 => format!("{:.1} kkeys/s", s / 1e3),
        s => format!("{:.0} keys/s", s),
    }
}

/// Whole-second uptime as `h`/`m`/`s` components, smallest useful form.
pub fn format_time(secs: f64) -> String {
    let total = secs as u64;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}h{:02}m{:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
