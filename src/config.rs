//! Recognised options and their startup-time validation. All fields can be
//! populated from CLI flags or from a JSON configuration file; nothing here
//! is re-validated on the hot path.

use std::path::PathBuf;

use num_bigint::BigUint;
use regex::Regex;
use serde::Deserialize;

use crate::error::{Result, ScanError};
use crate::keys::Secret;
use crate::keyutil::Network;

/// Highest supported grid size: 2^24 keys per batch.
pub const MAX_GRID_BITS: u8 = 24;

/// Default bound on shutdown drain.
pub const DEFAULT_AWAIT_QUEUE_EMPTY_SECS: u64 = 60;

/// How a line of a secrets file is decoded into a 256-bit secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SecretFormat {
    /// Decimal integer, e.g. `123456`.
    BigIntegerDecimal,
    /// Hex integer, e.g. `ab03` (no SHA256 applied despite the historic name).
    HexSha256,
    /// SHA256 over the line's UTF-8 bytes ("brain wallet").
    StringDoSha256,
    /// Base58Check WIF.
    DumpedPrivateKey,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanConfig {
    // Consumer side
    pub threads: usize,
    pub queue_size: usize,
    /// Sleep after an empty-queue round, in milliseconds.
    pub delay_empty_consumer: u64,
    pub runtime_public_key_calculation_check: bool,
    pub enable_vanity: bool,
    pub vanity_pattern: String,
    pub print_statistics_every_n_seconds: u64,
    pub address_index_path: PathBuf,
    pub findings_file: PathBuf,
    pub await_queue_empty_seconds: u64,

    // Producer side
    pub producers: usize,
    pub grid_num_bits: u8,
    /// 256-bit hex mask; set bits are forced to zero in each seed.
    pub kill_bits: String,
    pub run_once: bool,
    pub log_secret_base: bool,
    /// Expand grids through the batched kernel path instead of one scalar
    /// multiplication per key.
    pub batched_expansion: bool,
    pub network: Network,
    /// Secrets are read from this file when set, otherwise drawn from a
    /// per-producer PRNG.
    pub secrets_file: Option<PathBuf>,
    pub secret_format: SecretFormat,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            queue_size: 32,
            delay_empty_consumer: 50,
            runtime_public_key_calculation_check: false,
            enable_vanity: false,
            vanity_pattern: String::new(),
            print_statistics_every_n_seconds: 10,
            address_index_path: PathBuf::from("addresses.idx"),
            findings_file: PathBuf::from("found.txt"),
            await_queue_empty_seconds: DEFAULT_AWAIT_QUEUE_EMPTY_SECS,
            producers: 1,
            grid_num_bits: 14,
            kill_bits: String::new(),
            run_once: false,
            log_secret_base: false,
            batched_expansion: false,
            network: Network::Mainnet,
            secrets_file: None,
            secret_format: SecretFormat::StringDoSha256,
        }
    }
}

impl ScanConfig {
    /// Validate once and pre-compile the derived pieces (kill mask, vanity
    /// regex). Every rejection names the offending field.
    pub fn compile(self) -> Result<CompiledConfig> {
        if self.threads == 0 {
            return Err(ScanError::config("threads", "must be at least 1"));
        }
        if self.producers == 0 {
            return Err(ScanError::config("producers", "must be at least 1"));
        }
        if self.queue_size == 0 {
            return Err(ScanError::config("queueSize", "must be at least 1"));
        }
        if self.print_statistics_every_n_seconds == 0 {
            return Err(ScanError::config(
                "printStatisticsEveryNSeconds",
                "period must be greater than 0",
            ));
        }
        if self.grid_num_bits > MAX_GRID_BITS {
            return Err(ScanError::config(
                "gridNumBits",
                format!("{} exceeds the maximum of {}", self.grid_num_bits, MAX_GRID_BITS),
            ));
        }

        let kill_mask = parse_kill_bits(&self.kill_bits)?;
        if !mask_covers_grid(&kill_mask, self.grid_num_bits) {
            return Err(ScanError::config(
                "killBits",
                format!(
                    "mask must contain at least the low {} grid bits",
                    self.grid_num_bits
                ),
            ));
        }

        let vanity = if self.enable_vanity {
            // Only whole-string matching is supported, so the user pattern
            // is anchored on both sides.
            let anchored = format!("^(?:{})$", self.vanity_pattern);
            Some(
                Regex::new(&anchored)
                    .map_err(|e| ScanError::config("vanityPattern", e.to_string()))?,
            )
        } else {
            None
        };

        Ok(CompiledConfig {
            kill_mask,
            vanity,
            config: self,
        })
    }
}

/// A validated configuration plus the pieces derived from it.
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    pub config: ScanConfig,
    pub kill_mask: Secret,
    pub vanity: Option<Regex>,
}

impl CompiledConfig {
    #[inline]
    pub fn batch_size(&self) -> usize {
        1usize << self.config.grid_num_bits
    }
}

fn parse_kill_bits(hex_mask: &str) -> Result<Secret> {
    let trimmed = hex_mask.trim().trim_start_matches("0x");
    if trimmed.is_empty() {
        return Ok(Secret::ZERO);
    }
    let value = BigUint::parse_bytes(trimmed.as_bytes(), 16)
        .ok_or_else(|| ScanError::config("killBits", format!("not a hex mask: {}", hex_mask)))?;
    Secret::from_biguint(&value)
        .ok_or_else(|| ScanError::config("killBits", "mask exceeds 256 bits"))
}

/// The low `grid_bits` bits must all be set so `base | k` enumerates
/// `2^grid_bits` distinct secrets.
fn mask_covers_grid(mask: &Secret, grid_bits: u8) -> bool {
    for bit in 0..grid_bits as usize {
        let byte = 31 - bit / 8;
        if mask.as_bytes()[byte] & (1 << (bit % 8)) == 0 {
            return false;
        }
    }
    true
}
