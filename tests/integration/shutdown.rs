// Shutdown behaviour under load: producers blocked in offer must unblock,
// consumers must drain within the configured bound or the run reports the
// drop.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use keysweep::config::ScanConfig;
use keysweep::consumer::CollectingOutput;
use keysweep::index::AddressIndex;
use keysweep::scanner::{Scanner, StopToken};

/// Index that sleeps on every probe, to keep consumers busy while the
/// queue backs up.
struct SlowIndex {
    delay: Duration,
}

impl AddressIndex for SlowIndex {
    fn contains(&self, _hash160: &[u8; 20]) -> io::Result<bool> {
        std::thread::sleep(self.delay);
        Ok(false)
    }

    fn len(&self) -> usize {
        0
    }
}

fn load_config() -> ScanConfig {
    ScanConfig {
        threads: 1,
        producers: 2,
        queue_size: 1,
        delay_empty_consumer: 1,
        print_statistics_every_n_seconds: 3600,
        findings_file: PathBuf::new(),
        grid_num_bits: 6,
        kill_bits: "3f".to_string(),
        run_once: false,
        secrets_file: None,
        ..ScanConfig::default()
    }
}

#[test]
fn stop_with_full_queue_terminates_promptly() {
    let config = ScanConfig {
        await_queue_empty_seconds: 30,
        ..load_config()
    };
    let compiled = config.compile().unwrap();
    let scanner = Scanner::with_output(
        compiled,
        Arc::new(SlowIndex {
            delay: Duration::from_millis(1),
        }),
        Arc::new(CollectingOutput::new()),
    );

    let stop = StopToken::new();
    let run_stop = stop.clone();
    let handle = std::thread::spawn(move || scanner.run(run_stop).unwrap());

    // Let producers fill the queue and block in offer.
    std::thread::sleep(Duration::from_millis(300));
    let stop_requested = Instant::now();
    stop.stop();

    let deadline = Instant::now() + Duration::from_secs(35);
    while !handle.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(handle.is_finished(), "scanner did not shut down in time");

    let summary = handle.join().unwrap();
    assert!(summary.drained, "consumers should have drained the queue");
    assert!(
        stop_requested.elapsed() < Duration::from_secs(32),
        "shutdown exceeded awaitQueueEmpty plus slack"
    );
}

#[test]
fn drain_timeout_is_reported_not_hung() {
    // 64-key batches at 20ms per probe cannot drain inside one second, so
    // the run must return with the drop recorded instead of blocking.
    let config = ScanConfig {
        await_queue_empty_seconds: 1,
        ..load_config()
    };
    let compiled = config.compile().unwrap();
    let scanner = Scanner::with_output(
        compiled,
        Arc::new(SlowIndex {
            delay: Duration::from_millis(20),
        }),
        Arc::new(CollectingOutput::new()),
    );

    let stop = StopToken::new();
    let run_stop = stop.clone();
    let handle = std::thread::spawn(move || scanner.run(run_stop).unwrap());

    std::thread::sleep(Duration::from_millis(200));
    stop.stop();

    let deadline = Instant::now() + Duration::from_secs(10);
    while !handle.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(handle.is_finished(), "run must return after the drain bound");

    let summary = handle.join().unwrap();
    assert!(!summary.drained, "this load cannot drain in one second");
}
