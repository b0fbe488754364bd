use num_bigint::BigUint;

/// A 256-bit secret exponent, big-endian. Logically in `[1, n-1]` for the
/// secp256k1 group order `n`; values outside that range are representable
/// and surface as invalid batch entries instead of panics.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Secret(pub [u8; 32]);

impl Secret {
    pub const ZERO: Secret = Secret([0u8; 32]);

    #[inline]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Big-endian bytes, shorter-than-32 inputs are left-padded with zeros.
    /// Returns `None` if the input is longer than 32 bytes.
    pub fn from_be_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() > 32 {
            return None;
        }
        let mut bytes = [0u8; 32];
        bytes[32 - slice.len()..].copy_from_slice(slice);
        Some(Self(bytes))
    }

    pub fn from_biguint(value: &BigUint) -> Option<Self> {
        Self::from_be_slice(&value.to_bytes_be())
    }

    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    /// The low 64 bits, for grid index extraction.
    #[inline]
    pub fn low_u64(&self) -> u64 {
        u64::from_be_bytes(self.0[24..32].try_into().unwrap())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decimal rendering, used in safe logs and key details.
    pub fn to_decimal(&self) -> String {
        self.to_biguint().to_string()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret({})", self.to_hex())
    }
}

/// One candidate key as emitted by a producer: the secret, both serialised
/// public key forms and their HASH160 fingerprints.
///
/// Invariant: for a non-invalid entry the hashes equal the canonical HASH160
/// of the corresponding serialised point. `invalid` marks a zero secret or a
/// derivation that yielded the point at infinity; consumers skip the entry.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKeyBytes {
    pub secret: Secret,
    pub uncompressed: [u8; 65],
    pub compressed: [u8; 33],
    pub hash160_uncompressed: [u8; 20],
    pub hash160_compressed: [u8; 20],
    pub invalid: bool,
}

impl PublicKeyBytes {
    /// Placeholder for a secret that could not be turned into a point.
    pub fn invalid(secret: Secret) -> Self {
        Self {
            secret,
            uncompressed: [0u8; 65],
            compressed: [0u8; 33],
            hash160_uncompressed: [0u8; 20],
            hash160_compressed: [0u8; 20],
            invalid: true,
        }
    }
}

impl std::fmt::Debug for PublicKeyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKeyBytes")
            .field("secret", &self.secret)
            .field("invalid", &self.invalid)
            .field("hash160_compressed", &hex::encode(self.hash160_compressed))
            .finish()
    }
}

/// One unit of queue work. Ordered, immutable once built, owned by exactly
/// one component at a time (producer, queue, then a single consumer).
pub type Batch = Vec<PublicKeyBytes>;
