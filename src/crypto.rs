use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::{AffinePoint, ProjectivePoint, Scalar};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::keys::{PublicKeyBytes, Secret};

/// Hash160 = RIPEMD160(SHA256(data))
#[inline]
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripemd = Ripemd160::digest(sha);
    let mut result = [0u8; 20];
    result.copy_from_slice(&ripemd);
    result
}

/// Non-zero scalar in `[1, n-1]`, or `None` for zero / out-of-range secrets.
#[inline]
pub fn scalar_from_secret(secret: &Secret) -> Option<Scalar> {
    let scalar = Scalar::from_repr_vartime((*secret.as_bytes()).into())?;
    if scalar == Scalar::ZERO {
        return None;
    }
    Some(scalar)
}

/// Usable private key check (0 < s < n). Delegates to the scalar decode so
/// the crate has exactly one range check.
#[inline]
pub fn is_valid_secret(secret: &Secret) -> bool {
    scalar_from_secret(secret).is_some()
}

/// Derive a full `PublicKeyBytes` from one secret via a fresh scalar
/// multiplication. Zero or out-of-range secrets yield an invalid entry.
pub fn derive(secret: &Secret) -> PublicKeyBytes {
    let Some(scalar) = scalar_from_secret(secret) else {
        return PublicKeyBytes::invalid(*secret);
    };
    let point = (ProjectivePoint::GENERATOR * scalar).to_affine();
    public_key_bytes_from_point(*secret, &point)
}

/// Serialise and hash one affine point for the given secret. The point at
/// infinity yields an invalid entry.
pub fn public_key_bytes_from_point(secret: Secret, point: &AffinePoint) -> PublicKeyBytes {
    if point == &AffinePoint::IDENTITY {
        return PublicKeyBytes::invalid(secret);
    }

    let encoded_uncompressed = point.to_encoded_point(false);
    let encoded_compressed = point.to_encoded_point(true);

    let mut uncompressed = [0u8; 65];
    uncompressed.copy_from_slice(encoded_uncompressed.as_bytes());
    let mut compressed = [0u8; 33];
    compressed.copy_from_slice(encoded_compressed.as_bytes());

    PublicKeyBytes {
        secret,
        hash160_uncompressed: hash160(&uncompressed),
        hash160_compressed: hash160(&compressed),
        uncompressed,
        compressed,
        invalid: false,
    }
}

/// Independent re-derivation through `k256::SecretKey`, used by the runtime
/// self-check. Takes the library's high-level path instead of the producers'
/// point arithmetic so a bug in either is visible as a mismatch.
pub fn derive_reference(secret: &Secret) -> Option<PublicKeyBytes> {
    let secret_key = k256::SecretKey::from_slice(secret.as_bytes()).ok()?;
    let public_key = secret_key.public_key();

    let encoded_uncompressed = public_key.to_encoded_point(false);
    let encoded_compressed = public_key.to_encoded_point(true);

    let mut uncompressed = [0u8; 65];
    uncompressed.copy_from_slice(encoded_uncompressed.as_bytes());
    let mut compressed = [0u8; 33];
    compressed.copy_from_slice(encoded_compressed.as_bytes());

    Some(PublicKeyBytes {
        secret: *secret,
        hash160_uncompressed: hash160(&uncompressed),
        hash160_compressed: hash160(&compressed),
        uncompressed,
        compressed,
        invalid: false,
    })
}
