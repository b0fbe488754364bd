//! Scalar helpers shared by producers and consumers: grid-base masking,
//! grid-index composition, Base58Check address and WIF formatting.

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::SourceParseError;
use crate::keys::Secret;

/// Chain selector. Only affects Base58 display formats, never the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Version byte for P2PKH Base58Check addresses.
    #[inline]
    pub fn address_version(self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet => 0x6F,
        }
    }

    /// Version byte for WIF-encoded private keys.
    #[inline]
    pub fn wif_version(self) -> u8 {
        match self {
            Network::Mainnet => 0x80,
            Network::Testnet => 0xEF,
        }
    }
}

/// Clear every bit of `secret` that is set in `mask`. Producers use this to
/// turn a sampled seed into a grid base whose low `g` bits are free.
#[inline]
pub fn kill_bits(secret: &Secret, mask: &Secret) -> Secret {
    let mut out = [0u8; 32];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = secret.0[i] & !mask.0[i];
    }
    Secret(out)
}

/// `base | k`. Equivalent to `add_key` when the base's low grid bits are
/// zero, without the carry propagation.
#[inline]
pub fn compose_key(base: &Secret, k: u64) -> Secret {
    let mut out = *base;
    let k_bytes = k.to_be_bytes();
    for i in 0..8 {
        out.0[24 + i] |= k_bytes[i];
    }
    out
}

/// `base + k` with byte-wise carry. Documented alternative to `compose_key`;
/// identical results only while the base's low grid bits are all zero.
#[inline]
pub fn add_key(base: &Secret, k: u64) -> Secret {
    let mut out = *base;
    let mut carry = k;
    for byte in out.0.iter_mut().rev() {
        let sum = *byte as u64 + (carry & 0xFF);
        *byte = sum as u8;
        carry = (carry >> 8) + (sum >> 8);
    }
    out
}

/// Base58Check P2PKH address for a 20-byte HASH160.
pub fn hash160_to_base58_address(hash160: &[u8; 20], network: Network) -> String {
    let mut data = Vec::with_capacity(25);
    data.push(network.address_version());
    data.extend_from_slice(hash160);

    let checksum = Sha256::digest(Sha256::digest(&data));
    data.extend_from_slice(&checksum[..4]);

    bs58::encode(data).into_string()
}

/// Secret to WIF with explicit compression flag.
/// - compressed=true: 33-byte payload, encodes with a trailing 0x01
/// - compressed=false: 32-byte payload
pub fn secret_to_wif(secret: &Secret, compressed: bool, network: Network) -> String {
    let capacity = if compressed { 38 } else { 37 };
    let mut data = Vec::with_capacity(capacity);
    data.push(network.wif_version());
    data.extend_from_slice(secret.as_bytes());
    if compressed {
        data.push(0x01);
    }

    let checksum = Sha256::digest(Sha256::digest(&data));
    data.extend_from_slice(&checksum[..4]);

    bs58::encode(data).into_string()
}

/// Decode a dumped private key (WIF). Verifies the Base58Check checksum and
/// the network version byte; accepts both the 37-byte uncompressed and the
/// 38-byte compressed form.
pub fn wif_to_secret(wif: &str, network: Network) -> Result<Secret, SourceParseError> {
    let data = bs58::decode(wif)
        .into_vec()
        .map_err(|e| SourceParseError::Wif(e.to_string()))?;
    if data.len() != 37 && data.len() != 38 {
        return Err(SourceParseError::Wif(format!(
            "unexpected payload length {}",
            data.len()
        )));
    }

    let (payload, checksum) = data.split_at(data.len() - 4);
    let expected = Sha256::digest(Sha256::digest(payload));
    if checksum != &expected[..4] {
        return Err(SourceParseError::Wif("checksum mismatch".into()));
    }
    if payload[0] != network.wif_version() {
        return Err(SourceParseError::Wif(format!(
            "version byte 0x{:02x} does not match the configured network",
            payload[0]
        )));
    }
    if payload.len() == 34 && payload[33] != 0x01 {
        return Err(SourceParseError::Wif("bad compression suffix".into()));
    }

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&payload[1..33]);
    Ok(Secret::from_bytes(bytes))
}

/// The human-readable record logged for hits, misses and vanity matches.
pub fn format_key_details(
    secret: &Secret,
    public_key: &[u8],
    hash160: &[u8; 20],
    compressed: bool,
    network: Network,
) -> String {
    format!(
        "secret: {} WIF: {} public key: {} hash160: {} address: {} compressed: {}",
        secret.to_decimal(),
        secret_to_wif(secret, compressed, network),
        hex::encode(public_key),
        hex::encode(hash160),
        hash160_to_base58_address(hash160, network),
        compressed,
    )
}
