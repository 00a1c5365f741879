use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

/// Schnorr proof of knowledge of `x` such that `P = x·B`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Compressed nonce commitment `R = k·B`
    pub r: [u8; 32],
    /// Response `s = k + c·x`
    pub s: [u8; 32],
}

/// Length-prefixed SHA-512 of `parts`, reduced to a scalar
pub fn hash_to_scalar(parts: &[&[u8]]) -> Scalar {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&hasher.finalize());
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Map a label to a point with unknown discrete log relative to the basepoint
pub fn hash_to_point(label: &[u8]) -> RistrettoPoint {
    let mut hasher = Sha512::new();
    hasher.update(b"INTEROP_HashToPoint");
    hasher.update(label);
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&hasher.finalize());
    RistrettoPoint::from_uniform_bytes(&wide)
}

pub fn decode_point(bytes: &[u8; 32]) -> Option<RistrettoPoint> {
    CompressedRistretto(*bytes).decompress()
}

pub fn decode_scalar(bytes: &[u8; 32]) -> Option<Scalar> {
    Option::from(Scalar::from_canonical_bytes(*bytes))
}

pub fn random_scalar() -> Scalar {
    Scalar::random(&mut OsRng)
}

fn challenge(base: &RistrettoPoint, public: &RistrettoPoint, r: &[u8; 32], context: &[u8]) -> Scalar {
    hash_to_scalar(&[
        b"INTEROP_Schnorr",
        base.compress().as_bytes(),
        public.compress().as_bytes(),
        r,
        context,
    ])
}

/// Prove knowledge of `secret` for the point `secret·base`, bound to `context`.
///
/// The nonce is derived from the secret and the context.
pub fn prove(base: &RistrettoPoint, secret: &Scalar, context: &[u8]) -> Signature {
    let public = secret * base;
    let nonce = hash_to_scalar(&[b"INTEROP_Nonce", secret.as_bytes(), context]);
    let r = (nonce * base).compress().to_bytes();
    let c = challenge(base, &public, &r, context);
    let s = nonce + c * secret;
    Signature { r, s: s.to_bytes() }
}

/// Verify a proof created by [`prove`]
pub fn verify(base: &RistrettoPoint, public: &RistrettoPoint, proof: &Signature, context: &[u8]) -> bool {
    let Some(r) = decode_point(&proof.r) else {
        return false;
    };
    let Some(s) = decode_scalar(&proof.s) else {
        return false;
    };
    let c = challenge(base, public, &proof.r, context);
    s * base == r + c * public
}

/// Key a ledger committer uses to sign block headers
#[derive(Clone)]
pub struct SigningKey {
    secret: Scalar,
}

impl SigningKey {
    pub fn generate() -> Self {
        SigningKey {
            secret: random_scalar(),
        }
    }

    /// Deterministic key, for tests and fixed committer identities
    pub fn from_seed(seed: &[u8]) -> Self {
        SigningKey {
            secret: hash_to_scalar(&[b"INTEROP_SigningKey", seed]),
        }
    }

    pub fn verifying_key(&self) -> [u8; 32] {
        (self.secret * RISTRETTO_BASEPOINT_POINT).compress().to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        prove(&RISTRETTO_BASEPOINT_POINT, &self.secret, message)
    }
}

/// Verify a signature under a compressed verifying key
pub fn verify_signature(verifying_key: &[u8; 32], message: &[u8], signature: &Signature) -> bool {
    match decode_point(verifying_key) {
        Some(public) => verify(&RISTRETTO_BASEPOINT_POINT, &public, signature, message),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key = SigningKey::from_seed(b"alpha");
        let signature = key.sign(b"header");
        assert!(verify_signature(&key.verifying_key(), b"header", &signature));
        assert!(!verify_signature(&key.verifying_key(), b"other", &signature));

        let other = SigningKey::generate();
        assert!(!verify_signature(&other.verifying_key(), b"header", &signature));
    }

    #[test]
    fn test_proof_on_custom_base() {
        let base = hash_to_point(b"H");
        let secret = random_scalar();
        let public = secret * base;
        let proof = prove(&base, &secret, b"ctx");
        assert!(verify(&base, &public, &proof, b"ctx"));
        assert!(!verify(&base, &public, &proof, b"other ctx"));
        assert!(!verify(&RISTRETTO_BASEPOINT_POINT, &public, &proof, b"ctx"));
    }

    #[test]
    fn test_malformed_signature() {
        let key = SigningKey::from_seed(b"alpha");
        let mut signature = key.sign(b"header");
        signature.s = [0xff; 32];
        assert!(!verify_signature(&key.verifying_key(), b"header", &signature));
    }
}
