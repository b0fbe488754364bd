//! CLI argument parsing with clap. Flags mirror the JSON configuration
//! one-to-one; `--config` loads the JSON file instead and wins over all
//! other flags.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{ScanConfig, SecretFormat, DEFAULT_AWAIT_QUEUE_EMPTY_SECS};
use crate::error::Result;
use crate::keyutil::Network;

#[derive(Parser, Debug)]
#[command(name = "keysweep", version, about = "Search secp256k1 secrets whose addresses appear in a HASH160 index")]
pub struct Args {
    /// JSON configuration file. When given, every other flag is ignored.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Consumer worker threads
    #[arg(short = 't', long, default_value_t = 4)]
    pub threads: usize,

    /// Producer threads
    #[arg(short = 'p', long, default_value_t = 1)]
    pub producers: usize,

    /// Batch queue capacity
    #[arg(long, default_value_t = 32)]
    pub queue_size: usize,

    /// Consumer sleep after an empty poll, in milliseconds
    #[arg(long, default_value_t = 50)]
    pub delay_empty_consumer: u64,

    /// Re-derive every key through the reference path and compare
    #[arg(long, default_value_t = false)]
    pub runtime_check: bool,

    /// Regex matched against the whole Base58 address of every key
    #[arg(long, value_name = "REGEX")]
    pub vanity_pattern: Option<String>,

    /// Statistics interval in seconds
    #[arg(long, default_value_t = 10)]
    pub stats_interval: u64,

    /// Sorted HASH160 index file
    #[arg(long, value_name = "FILE", default_value = "addresses.idx")]
    pub address_index: PathBuf,

    /// File confirmed hits are appended to
    #[arg(long, value_name = "FILE", default_value = "found.txt")]
    pub findings_file: PathBuf,

    /// Number of enumerated low bits per grid (batch size = 2^g)
    #[arg(short = 'g', long, default_value_t = 14)]
    pub grid_bits: u8,

    /// 256-bit hex mask of seed bits forced to zero
    #[arg(long, value_name = "HEX", default_value = "3fff")]
    pub kill_bits: String,

    /// Produce exactly one batch per producer, then exit
    #[arg(long, default_value_t = false)]
    pub run_once: bool,

    /// Log every grid base as it is formed
    #[arg(long, default_value_t = false)]
    pub log_secret_base: bool,

    /// Amortise the scalar multiplication across the grid instead of
    /// multiplying per key
    #[arg(long, default_value_t = false)]
    pub batched_expansion: bool,

    #[arg(long, value_enum, default_value = "mainnet")]
    pub network: CliNetwork,

    /// Read seed secrets from this file instead of the PRNG
    #[arg(long, value_name = "FILE")]
    pub secrets_file: Option<PathBuf>,

    /// Line format of the secrets file
    #[arg(long, value_enum, default_value = "string-do-sha256")]
    pub secret_format: CliSecretFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliNetwork {
    Mainnet,
    Testnet,
}

impl From<CliNetwork> for Network {
    fn from(network: CliNetwork) -> Self {
        match network {
            CliNetwork::Mainnet => Network::Mainnet,
            CliNetwork::Testnet => Network::Testnet,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliSecretFormat {
    BigIntegerDecimal,
    HexSha256,
    StringDoSha256,
    DumpedPrivateKey,
}

impl From<CliSecretFormat> for SecretFormat {
    fn from(format: CliSecretFormat) -> Self {
        match format {
            CliSecretFormat::BigIntegerDecimal => SecretFormat::BigIntegerDecimal,
            CliSecretFormat::HexSha256 => SecretFormat::HexSha256,
            CliSecretFormat::StringDoSha256 => SecretFormat::StringDoSha256,
            CliSecretFormat::DumpedPrivateKey => SecretFormat::DumpedPrivateKey,
        }
    }
}

impl Args {
    /// Resolve the effective configuration: the JSON file when `--config`
    /// is present, the flags otherwise.
    pub fn into_config(self) -> Result<ScanConfig> {
        if let Some(path) = &self.config {
            let content = std::fs::read_to_string(path)?;
            let config: ScanConfig = serde_json::from_str(&content)?;
            return Ok(config);
        }

        Ok(ScanConfig {
            threads: self.threads,
            queue_size: self.queue_size,
            delay_empty_consumer: self.delay_empty_consumer,
            runtime_public_key_calculation_check: self.runtime_check,
            enable_vanity: self.vanity_pattern.is_some(),
            vanity_pattern: self.vanity_pattern.unwrap_or_default(),
            print_statistics_every_n_seconds: self.stats_interval,
            address_index_path: self.address_index,
            findings_file: self.findings_file,
            await_queue_empty_seconds: DEFAULT_AWAIT_QUEUE_EMPTY_SECS,
            producers: self.producers,
            grid_num_bits: self.grid_bits,
            kill_bits: self.kill_bits,
            run_once: self.run_once,
            log_secret_base: self.log_secret_base,
            batched_expansion: self.batched_expansion,
            network: self.network.into(),
            secrets_file: self.secrets_file,
            secret_format: self.secret_format.into(),
        })
    }
}
