use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use keysweep::cli::Args;
use keysweep::crypto;
use keysweep::index::{AddressIndex, MmapIndex};
use keysweep::keys::Secret;
use keysweep::keyutil::{secret_to_wif, Network};
use keysweep::scanner::{Scanner, StopToken};

/// Verify key derivation against known vectors before scanning starts. A
/// wrong HASH160 here would mean silently missed matches, a wrong WIF an
/// unrecoverable hit.
fn startup_self_test() -> bool {
    // (secret, compressed hash160, uncompressed hash160)
    let vectors = [
        (
            1u64,
            "751e76e8199196d454941c45d1b3a323f1433bd6",
            "91b24bf9f5288532960ac687abb035127b1d28a5",
        ),
        (
            2u64,
            "06afd46bcdfd22ef94ac122aa11f241244a37ecc",
            "d6c8e828c1eca1bba065e1b83e1dc2a36e387a42",
        ),
    ];

    for (k, expected_compressed, expected_uncompressed) in vectors {
        let entry = crypto::derive(&Secret::from_u64(k));
        if entry.invalid
            || hex::encode(entry.hash160_compressed) != expected_compressed
            || hex::encode(entry.hash160_uncompressed) != expected_uncompressed
        {
            error!("self-test failed: wrong HASH160 for secret {}", k);
            return false;
        }
    }

    let wif = secret_to_wif(&Secret::from_u64(1), true, Network::Mainnet);
    if wif != "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn" {
        error!("self-test failed: wrong WIF for secret 1");
        return false;
    }

    true
}


fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };
    let compiled = match config.compile() {
        Ok(compiled) => compiled,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    if !startup_self_test() {
        process::exit(1);
    }

    let index = match MmapIndex::open(&compiled.config.address_index_path) {
        Ok(index) => index,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };
    info!(
        "address index {} loaded: {} records",
        compiled.config.address_index_path.display(),
        index.len()
    );

    let stop = StopToken::new();
    let ctrlc_stop = stop.clone();
    ctrlc::set_handler(move || {
        info!("stop requested");
        ctrlc_stop.stop();
    })
    .ok();

    let scanner = Scanner::new(compiled, Arc::new(index));
    if let Err(e) = scanner.run(stop) {
        error!("{}", e);
        process::exit(1);
    }
}
