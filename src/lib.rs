//! keysweep: pipelined search for secp256k1 secrets whose addresses appear
//! in a precomputed HASH160 index.
//!
//! Architecture:
//! - `secrets` + `producer`: seed secrets become grids of `2^g` related
//!   keys, derived in batches
//! - `queue`: the bounded hand-off between producer and consumer pools
//! - `consumer`: per-key verification (index probes, self-check, vanity)
//! - `scanner`: lifecycle — start order, stop token, shutdown drain

pub mod cli;
pub mod config;
pub mod consumer;
pub mod crypto;
pub mod error;
pub mod index;
pub mod keys;
pub mod keyutil;
pub mod producer;
pub mod queue;
pub mod scanner;
pub mod secrets;
pub mod stats;
