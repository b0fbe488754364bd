// End-to-end search scenarios: a full scanner run over a seeded secrets
// file, asserting on the exact records the consumers emit.

use std::path::PathBuf;
use std::sync::Arc;

use keysweep::config::{ScanConfig, SecretFormat};
use keysweep::consumer::{CollectingOutput, HIT_PREFIX, HIT_SAFE_PREFIX, MISS_PREFIX, VANITY_HIT_PREFIX};
use keysweep::crypto;
use keysweep::index::MemoryIndex;
use keysweep::keys::Secret;
use keysweep::keyutil::{secret_to_wif, Network};
use keysweep::scanner::{ScanSummary, Scanner, StopToken};

fn write_secrets(name: &str, lines: &[&str]) -> PathBuf {
    let path = std::env::temp_dir().join(name);
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}

fn run_once_config(secrets_path: PathBuf, grid_bits: u8, kill_bits: &str) -> ScanConfig {
    ScanConfig {
        threads: 1,
        queue_size: 8,
        delay_empty_consumer: 1,
        print_statistics_every_n_seconds: 3600,
        findings_file: PathBuf::new(),
        await_queue_empty_seconds: 30,
        producers: 1,
        grid_num_bits: grid_bits,
        kill_bits: kill_bits.to_string(),
        run_once: true,
        secrets_file: Some(secrets_path),
        secret_format: SecretFormat::BigIntegerDecimal,
        ..ScanConfig::default()
    }
}

fn run_scan(
    config: ScanConfig,
    index: MemoryIndex,
    output: Arc<CollectingOutput>,
) -> ScanSummary {
    let compiled = config.compile().unwrap();
    let scanner = Scanner::with_output(compiled, Arc::new(index), output);
    scanner.run(StopToken::new()).unwrap()
}

#[test]
fn known_hit_uncompressed() {
    let entry = crypto::derive(&Secret::from_u64(1));
    let index: MemoryIndex = [entry.hash160_uncompressed].into_iter().collect();
    let secrets = write_secrets("keysweep_scenario_unc.txt", &["1"]);
    let output = Arc::new(CollectingOutput::new());

    let summary = run_scan(run_once_config(secrets.clone(), 0, ""), index, output.clone());

    assert_eq!(summary.hits, 1);
    assert_eq!(output.count_with_prefix(HIT_SAFE_PREFIX), 5);
    assert_eq!(output.count_with_prefix(HIT_PREFIX), 1);
    let hit_line = output
        .lines()
        .into_iter()
        .find(|l| l.starts_with(HIT_PREFIX))
        .unwrap();
    assert!(hit_line.contains("compressed: false"));

    let _ = std::fs::remove_file(&secrets);
}

#[test]
fn known_hit_compressed() {
    let entry = crypto::derive(&Secret::from_u64(1));
    let index: MemoryIndex = [entry.hash160_compressed].into_iter().collect();
    let secrets = write_secrets("keysweep_scenario_cmp.txt", &["1"]);
    let output = Arc::new(CollectingOutput::new());

    let summary = run_scan(run_once_config(secrets.clone(), 0, ""), index, output.clone());

    assert_eq!(summary.hits, 1);
    assert_eq!(output.count_with_prefix(HIT_SAFE_PREFIX), 5);
    let hit_line = output
        .lines()
        .into_iter()
        .find(|l| l.starts_with(HIT_PREFIX))
        .unwrap();
    assert!(hit_line.contains("compressed: true"));

    let _ = std::fs::remove_file(&secrets);
}

#[test]
fn known_hit_on_both_forms_double_counts() {
    let entry = crypto::derive(&Secret::from_u64(1));
    let index: MemoryIndex = [entry.hash160_uncompressed, entry.hash160_compressed]
        .into_iter()
        .collect();
    let secrets = write_secrets("keysweep_scenario_both.txt", &["1"]);
    let output = Arc::new(CollectingOutput::new());

    let summary = run_scan(run_once_config(secrets.clone(), 0, ""), index, output.clone());

    // One increment and one safe log per compression form.
    assert_eq!(summary.hits, 2);
    assert_eq!(output.count_with_prefix(HIT_PREFIX), 2);
    assert_eq!(output.count_with_prefix(HIT_SAFE_PREFIX), 10);
    assert_eq!(summary.hits, output.count_with_prefix(HIT_PREFIX) as u64);

    let _ = std::fs::remove_file(&secrets);
}

#[test]
fn grid_expansion_probes_every_enumerated_secret() {
    // Seed 0, killBits 0xFF, g = 8: secrets 0..255 in one batch. Secret 0
    // is invalid, the other 255 get two probes each.
    let secrets = write_secrets("keysweep_scenario_grid.txt", &["0"]);
    let output = Arc::new(CollectingOutput::new());

    let summary = run_scan(
        run_once_config(secrets.clone(), 8, "ff"),
        MemoryIndex::new(),
        output.clone(),
    );

    assert_eq!(summary.checked_keys, 255 * 2);
    assert_eq!(summary.hits, 0);
    assert_eq!(output.count_with_prefix(VANITY_HIT_PREFIX), 0);

    let _ = std::fs::remove_file(&secrets);
}

#[test]
fn vanity_match_without_index_hit() {
    // The compressed address of secret 19 is 1AmybvuPDrDpsqsgSzqbwALGcW1t6Yn9uN.
    let secrets = write_secrets("keysweep_scenario_vanity.txt", &["19"]);
    let output = Arc::new(CollectingOutput::new());
    let config = ScanConfig {
        enable_vanity: true,
        vanity_pattern: "1A.*".to_string(),
        ..run_once_config(secrets.clone(), 0, "")
    };

    let summary = run_scan(config, MemoryIndex::new(), output.clone());

    assert_eq!(summary.hits, 0);
    assert_eq!(summary.vanity_hits, 1);
    assert_eq!(output.count_with_prefix(VANITY_HIT_PREFIX), 1);
    let vanity_line = output
        .lines()
        .into_iter()
        .find(|l| l.starts_with(VANITY_HIT_PREFIX))
        .unwrap();
    assert!(vanity_line.contains("address: 1A"));

    let _ = std::fs::remove_file(&secrets);
}

#[test]
fn wif_secrets_file_drives_the_pipeline() {
    let secret = Secret::from_u64(1);
    let wif = secret_to_wif(&secret, true, Network::Mainnet);
    let entry = crypto::derive(&secret);
    let index: MemoryIndex = [entry.hash160_compressed].into_iter().collect();

    let secrets = write_secrets("keysweep_scenario_wif.txt", &[wif.as_str()]);
    let output = Arc::new(CollectingOutput::new());
    let config = ScanConfig {
        secret_format: SecretFormat::DumpedPrivateKey,
        ..run_once_config(secrets.clone(), 0, "")
    };

    let summary = run_scan(config, index, output.clone());

    assert_eq!(summary.hits, 1);
    assert_eq!(output.count_with_prefix(HIT_PREFIX), 1);

    let _ = std::fs::remove_file(&secrets);
}

#[test]
fn same_seed_twice_emits_identical_records() {
    let entry = crypto::derive(&Secret::from_u64(5));
    let secrets = write_secrets("keysweep_scenario_repeat.txt", &["5"]);

    let mut runs = Vec::new();
    for _ in 0..2 {
        let index: MemoryIndex = [entry.hash160_compressed].into_iter().collect();
        let output = Arc::new(CollectingOutput::new());
        run_scan(
            run_once_config(secrets.clone(), 4, "f"),
            index,
            output.clone(),
        );
        runs.push(output.lines());
    }

    assert_eq!(runs[0], runs[1]);
    assert!(!runs[0].is_empty());

    let _ = std::fs::remove_file(&secrets);
}

#[test]
fn misses_are_traced_when_enabled() {
    let secrets = write_secrets("keysweep_scenario_miss.txt", &["1"]);
    let output = Arc::new(CollectingOutput::with_trace());

    let summary = run_scan(
        run_once_config(secrets.clone(), 0, ""),
        MemoryIndex::new(),
        output.clone(),
    );

    assert_eq!(summary.hits, 0);
    // One miss record per compression form.
    assert_eq!(output.count_with_prefix(MISS_PREFIX), 2);

    let _ = std::fs::remove_file(&secrets);
}

#[test]
fn findings_file_receives_one_line_per_hit() {
    let entry = crypto::derive(&Secret::from_u64(1));
    let index: MemoryIndex = [entry.hash160_compressed].into_iter().collect();
    let secrets = write_secrets("keysweep_scenario_findings.txt", &["1"]);
    let findings = std::env::temp_dir().join("keysweep_scenario_findings_out.txt");
    let _ = std::fs::remove_file(&findings);

    let config = ScanConfig {
        findings_file: findings.clone(),
        ..run_once_config(secrets.clone(), 0, "")
    };
    run_scan(config, index, Arc::new(CollectingOutput::new()));

    let content = std::fs::read_to_string(&findings).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("compressed"));
    assert!(lines[0].contains(&Secret::from_u64(1).to_hex()));

    let _ = std::fs::remove_file(&secrets);
    let _ = std::fs::remove_file(&findings);
}

#[test]
fn runtime_check_stays_silent_on_good_batches() {
    let secrets = write_secrets("keysweep_scenario_selfcheck.txt", &["7"]);
    let output = Arc::new(CollectingOutput::new());
    let config = ScanConfig {
        runtime_public_key_calculation_check: true,
        ..run_once_config(secrets.clone(), 4, "f")
    };

    run_scan(config, MemoryIndex::new(), output.clone());

    assert_eq!(output.count_with_prefix("self-check mismatch"), 0);

    let _ = std::fs::remove_file(&secrets);
}

#[test]
fn batched_expansion_finds_the_same_hit() {
    let entry = crypto::derive(&Secret::from_u64(1));
    let index: MemoryIndex = [entry.hash160_compressed].into_iter().collect();
    let secrets = write_secrets("keysweep_scenario_batched.txt", &["1"]);
    let output = Arc::new(CollectingOutput::new());
    let config = ScanConfig {
        batched_expansion: true,
        ..run_once_config(secrets.clone(), 4, "f")
    };

    let summary = run_scan(config, index, output.clone());

    assert_eq!(summary.hits, 1);
    assert_eq!(output.count_with_prefix(HIT_PREFIX), 1);

    let _ = std::fs::remove_file(&secrets);
}
