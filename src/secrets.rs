//! Seed secret sources. Each producer owns its source outright: the PRNG is
//! never shared between threads, and a file is read by exactly one producer.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use num_bigint::BigUint;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};
use tracing::{error, info};

use crate::config::SecretFormat;
use crate::crypto::is_valid_secret;
use crate::error::SourceParseError;
use crate::keys::Secret;
use crate::keyutil::{wif_to_secret, Network};
use crate::scanner::StopToken;

/// A lazy sequence of seed secrets. `None` means exhausted (file sources)
/// or stopped; the random source is infinite and only ends on stop.
pub trait SecretSource: Send {
    fn next_secret(&mut self) -> Option<Secret>;
}

impl SecretSource for Box<dyn SecretSource> {
    fn next_secret(&mut self) -> Option<Secret> {
        (**self).next_secret()
    }
}

/// Cryptographic PRNG source, one instance per producer thread.
pub struct RandomSecrets {
    rng: StdRng,
    stop: StopToken,
}

impl RandomSecrets {
    pub fn new(stop: StopToken) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            stop,
        }
    }
}

impl SecretSource for RandomSecrets {
    fn next_secret(&mut self) -> Option<Secret> {
        let mut bytes = [0u8; 32];
        while !self.stop.is_stopped() {
            self.rng.fill_bytes(&mut bytes);
            // Out-of-range draws are vanishingly rare; redraw instead of
            // clamping so the distribution stays uniform.
            let secret = Secret::from_bytes(bytes);
            if is_valid_secret(&secret) {
                return Some(secret);
            }
        }
        None
    }
}

/// Line counts for one secrets file, reported when the file is exhausted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadStatistic {
    pub decoded: u64,
    pub parse_errors: u64,
}

/// Line-oriented file source. A line that fails to decode is logged and
/// skipped; the source continues with the next line.
pub struct SecretsFile {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    format: SecretFormat,
    network: Network,
    stop: StopToken,
    stats: ReadStatistic,
}

impl SecretsFile {
    pub fn open(
        path: &Path,
        format: SecretFormat,
        network: Network,
        stop: StopToken,
    ) -> std::io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            format,
            network,
            stop,
            stats: ReadStatistic::default(),
        })
    }

    pub fn stats(&self) -> ReadStatistic {
        self.stats
    }
}

impl SecretSource for SecretsFile {
    fn next_secret(&mut self) -> Option<Secret> {
        while !self.stop.is_stopped() {
            let line = match self.lines.next() {
                None => {
                    info!(
                        "secrets file {} exhausted: {} decoded, {} parse errors",
                        self.path.display(),
                        self.stats.decoded,
                        self.stats.parse_errors
                    );
                    return None;
                }
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    error!("read error on {}: {}", self.path.display(), e);
                    return None;
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match decode_secret(line, self.format, self.network) {
                Ok(secret) => {
                    self.stats.decoded += 1;
                    return Some(secret);
                }
                Err(e) => {
                    self.stats.parse_errors += 1;
                    error!("skipping line of {}: {}", self.path.display(), e);
                }
            }
        }
        None
    }
}

/// Decode one line per the configured format.
pub fn decode_secret(
    line: &str,
    format: SecretFormat,
    network: Network,
) -> Result<Secret, SourceParseError> {
    match format {
        SecretFormat::BigIntegerDecimal => {
            let value = BigUint::parse_bytes(line.as_bytes(), 10)
                .ok_or_else(|| SourceParseError::Decimal(line.to_string()))?;
            Secret::from_biguint(&value).ok_or(SourceParseError::Overflow)
        }
        SecretFormat::HexSha256 => {
            let value = BigUint::parse_bytes(line.as_bytes(), 16)
                .ok_or_else(|| SourceParseError::Hex(line.to_string()))?;
            Secret::from_biguint(&value).ok_or(SourceParseError::Overflow)
        }
        SecretFormat::StringDoSha256 => {
            let digest = Sha256::digest(line.as_bytes());
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(&digest);
            Ok(Secret::from_bytes(bytes))
        }
        SecretFormat::DumpedPrivateKey => wif_to_secret(line, network),
    }
}
