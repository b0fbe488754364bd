//! Producers turn seed secrets into batches of derived public keys.
//!
//! Both variants share one loop: pull a seed, mask it down to a grid base,
//! expand the base into `2^g` related keys, hand the batch to the queue.
//! They differ only in how the expansion runs: the canonical CPU variant
//! multiplies per key, the kernel variant asks an external expander for all
//! points of the grid at once and post-processes on the host.

use crossbeam_channel::Sender;
use k256::{AffinePoint, ProjectivePoint};
use rayon::prelude::*;
use tracing::{debug, error, info, trace};

use crate::crypto;
use crate::keys::{Batch, Secret};
use crate::keyutil::{compose_key, kill_bits};
use crate::queue::BatchQueue;
use crate::scanner::StopToken;
use crate::secrets::SecretSource;

/// Contract for batched grid expansion (GPU, SIMD, or the CPU fallback
/// below). `expand` returns `2^grid_bits` points where index `k` holds the
/// public point of `base | k`; the point at infinity marks an unusable
/// entry. Serialisation and hashing stay on the host.
pub trait GridKernel: Send {
    fn expand(&self, base: &Secret, grid_bits: u8) -> Result<Vec<AffinePoint>, String>;
}

/// Kernel that amortises the one expensive scalar multiplication over the
/// whole grid: with the base's low `g` bits clear, `P(base | k)` equals
/// `P(base) + k·G`, so the grid is one multiply plus `2^g - 1` additions.
pub struct CpuGridKernel;

impl GridKernel for CpuGridKernel {
    fn expand(&self, base: &Secret, grid_bits: u8) -> Result<Vec<AffinePoint>, String> {
        let count = 1usize << grid_bits;
        let base_point = match crypto::scalar_from_secret(base) {
            Some(scalar) => ProjectivePoint::GENERATOR * scalar,
            // A zero base is legal: the k = 0 entry is invalid, the rest of
            // the grid follows from k·G.
            None if base.is_zero() => ProjectivePoint::IDENTITY,
            None => return Err(format!("grid base out of range: {}", base.to_hex())),
        };

        let mut points = Vec::with_capacity(count);
        let mut acc = base_point;
        for _ in 0..count {
            points.push(acc.to_affine());
            acc += ProjectivePoint::GENERATOR;
        }
        Ok(points)
    }
}

/// How one grid base becomes a full batch.
pub trait BatchStrategy: Send {
    /// `None` means the expansion failed and the batch is skipped; the
    /// producer loop continues with the next seed.
    fn expand_batch(&self, base: &Secret, grid_bits: u8) -> Option<Batch>;
}

impl BatchStrategy for Box<dyn BatchStrategy> {
    fn expand_batch(&self, base: &Secret, grid_bits: u8) -> Option<Batch> {
        (**self).expand_batch(base, grid_bits)
    }
}

/// Canonical variant: one scalar multiplication per grid key.
pub struct ScalarStrategy;

impl BatchStrategy for ScalarStrategy {
    fn expand_batch(&self, base: &Secret, grid_bits: u8) -> Option<Batch> {
        let batch_size = 1usize << grid_bits;
        let mut batch = Batch::with_capacity(batch_size);
        for k in 0..batch_size as u64 {
            let secret = compose_key(base, k);
            let entry = crypto::derive(&secret);
            if entry.invalid {
                debug!("invalid grid entry for secret {}", secret.to_decimal());
            }
            batch.push(entry);
        }
        Some(batch)
    }
}

/// Batched variant: grid expansion runs in the kernel, serialisation and
/// HASH160 run on the host across the rayon pool.
pub struct KernelStrategy<K: GridKernel> {
    kernel: K,
}

impl<K: GridKernel> KernelStrategy<K> {
    pub fn new(kernel: K) -> Self {
        Self { kernel }
    }
}

impl<K: GridKernel> BatchStrategy for KernelStrategy<K> {
    fn expand_batch(&self, base: &Secret, grid_bits: u8) -> Option<Batch> {
        let points = match self.kernel.expand(base, grid_bits) {
            Ok(points) => points,
            Err(e) => {
                error!("kernel expansion failed for base {}: {}", base.to_hex(), e);
                return None;
            }
        };

        let batch = points
            .into_par_iter()
            .enumerate()
            .map(|(k, point)| {
                let secret = compose_key(base, k as u64);
                crypto::public_key_bytes_from_point(secret, &point)
            })
            .collect();
        Some(batch)
    }
}

/// The producer loop around one secret source and one expansion strategy.
pub struct Producer<S: SecretSource, B: BatchStrategy> {
    grid_bits: u8,
    kill_mask: Secret,
    run_once: bool,
    log_secret_base: bool,
    source: S,
    strategy: B,
    queue: BatchQueue,
    stop: StopToken,
    done: Sender<()>,
}

impl<S: SecretSource, B: BatchStrategy> Producer<S, B> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        grid_bits: u8,
        kill_mask: Secret,
        run_once: bool,
        log_secret_base: bool,
        source: S,
        strategy: B,
        queue: BatchQueue,
        stop: StopToken,
        done: Sender<()>,
    ) -> Self {
        Self {
            grid_bits,
            kill_mask,
            run_once,
            log_secret_base,
            source,
            strategy,
            queue,
            stop,
            done,
        }
    }
}

impl<S: SecretSource, B: BatchStrategy> Producer<S, B> {
    /// Run until the stop token rises, the source is exhausted, or (with
    /// `run_once`) one batch has been submitted. Always signals completion.
    pub fn run(mut self) {
        while !self.stop.is_stopped() {
            let Some(seed) = self.source.next_secret() else {
                break;
            };

            let base = kill_bits(&seed, &self.kill_mask);
            if self.log_secret_base {
                info!("secret base: {}/{}", base.to_hex(), self.grid_bits);
            }
            trace!(
                "seed {} mask {} base {}",
                seed.to_hex(),
                self.kill_mask.to_hex(),
                base.to_hex()
            );

            if let Some(batch) = self.strategy.expand_batch(&base, self.grid_bits) {
                if !self.queue.offer(batch, &self.stop) {
                    // Stop rose mid-offer, or every consumer is gone.
                    break;
                }
            }

            if self.run_once {
                break;
            }
        }

        let _ = self.done.send(());
    }
}
