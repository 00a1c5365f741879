//! Range proofs for committed values.
//!
//! A value `v < 2^n` committed as `C = v·G + r·H` is split into bit
//! commitments `C_i = b_i·G + r_i·H` with `Σ 2^i·r_i = r`, so that
//! `Σ 2^i·C_i = C`. Each bit commitment carries a two-branch OR proof that it
//! opens to 0 or to 1 over `H`.

use super::pedersen::Generators;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity as _;
use interop_core::error::{InteropError, Result};
use interop_proofs::schnorr::{decode_point, decode_scalar, hash_to_scalar, random_scalar};
use serde::{Deserialize, Serialize};

/// Range proof system used by the committed-quantity scheme
pub trait RangeProver: Send + Sync {
    /// Encoded proof that `value·G + blinding·H` holds a value below `2^bits`
    fn prove(&self, gens: &Generators, value: u64, blinding: &Scalar, bits: u32, context: &[u8]) -> Result<Vec<u8>>;

    /// True if `proof` shows that `commitment` holds a value below `2^bits`
    fn verify(&self, gens: &Generators, commitment: &RistrettoPoint, proof: &[u8], bits: u32, context: &[u8]) -> bool;
}

/// [`RangeProver`] producing one OR proof per bit of the value
#[derive(Debug, Default, Clone, Copy)]
pub struct BitDecomposition;

impl RangeProver for BitDecomposition {
    fn prove(&self, gens: &Generators, value: u64, blinding: &Scalar, bits: u32, context: &[u8]) -> Result<Vec<u8>> {
        RangeProof::prove(gens, value, blinding, bits, context)?.to_bytes()
    }

    fn verify(&self, gens: &Generators, commitment: &RistrettoPoint, proof: &[u8], bits: u32, context: &[u8]) -> bool {
        match RangeProof::from_bytes(proof) {
            Ok(proof) => proof.verify(gens, commitment, bits, context),
            Err(_) => false,
        }
    }
}

/// Proof that one bit commitment opens to 0 or 1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitProof {
    pub commitment: [u8; 32],
    /// Challenge and response of the "bit is 0" branch
    pub e0: [u8; 32],
    pub s0: [u8; 32],
    /// Challenge and response of the "bit is 1" branch
    pub e1: [u8; 32],
    pub s1: [u8; 32],
}

/// Proof that a commitment holds a value of at most `bits.len()` bits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeProof {
    pub bits: Vec<BitProof>,
}

fn bit_challenge(
    context: &[u8],
    index: usize,
    commitment: &[u8; 32],
    r0: &RistrettoPoint,
    r1: &RistrettoPoint,
) -> Scalar {
    hash_to_scalar(&[
        b"zkatdlog.range",
        context,
        &(index as u64).to_le_bytes(),
        commitment,
        r0.compress().as_bytes(),
        r1.compress().as_bytes(),
    ])
}

impl RangeProof {
    /// Prove that `value·G + blinding·H` holds a value below `2^bits`
    ///
    /// # Parameters
    /// * `gens` - Commitment generators
    /// * `value` - Committed value
    /// * `blinding` - Blinding factor of the commitment
    /// * `bits` - Bit length of the range, at most 64
    /// * `context` - Data the proof is bound to, typically the commitment
    pub fn prove(gens: &Generators, value: u64, blinding: &Scalar, bits: u32, context: &[u8]) -> Result<Self> {
        if bits == 0 || bits > 64 {
            return Err(InteropError::InvalidPrecision(bits));
        }
        if bits < 64 && value >> bits != 0 {
            return Err(InteropError::InvalidRequest(format!(
                "value {} does not fit {} bits",
                value, bits
            )));
        }

        // r_0 absorbs the difference so the weighted blindings sum to r
        let mut blindings: Vec<Scalar> = (0..bits).map(|_| random_scalar()).collect();
        let weighted_rest = blindings
            .iter()
            .enumerate()
            .skip(1)
            .fold(Scalar::ZERO, |acc, (i, r)| acc + Scalar::from(1u64 << i) * r);
        blindings[0] = blinding - weighted_rest;

        let bits = blindings
            .iter()
            .enumerate()
            .map(|(i, r)| prove_bit(gens, (value >> i) & 1 == 1, r, i, context))
            .collect();
        Ok(RangeProof { bits })
    }

    /// True if `commitment` holds a value below `2^bits`
    pub fn verify(&self, gens: &Generators, commitment: &RistrettoPoint, bits: u32, context: &[u8]) -> bool {
        if self.bits.len() != bits as usize || bits == 0 || bits > 64 {
            return false;
        }
        let mut recombined = RistrettoPoint::identity();
        for (i, bit) in self.bits.iter().enumerate() {
            let Some(c) = verify_bit(gens, bit, i, context) else {
                return false;
            };
            recombined += Scalar::from(1u64 << i) * c;
        }
        &recombined == commitment
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(raw)?)
    }
}

fn prove_bit(gens: &Generators, bit: bool, blinding: &Scalar, index: usize, context: &[u8]) -> BitProof {
    let point = if bit { gens.g + blinding * gens.h } else { blinding * gens.h };
    let commitment = point.compress().to_bytes();
    // Branch statements: point = r·H, or point - G = r·H
    let statements = [point, point - gens.g];
    let real = usize::from(bit);
    let fake = 1 - real;

    let nonce = random_scalar();
    let fake_e = random_scalar();
    let fake_s = random_scalar();
    let mut nonces = [RistrettoPoint::identity(); 2];
    nonces[real] = nonce * gens.h;
    nonces[fake] = fake_s * gens.h - fake_e * statements[fake];

    let c = bit_challenge(context, index, &commitment, &nonces[0], &nonces[1]);
    let real_e = c - fake_e;
    let real_s = nonce + real_e * blinding;

    let (e, s) = if bit {
        ([fake_e, real_e], [fake_s, real_s])
    } else {
        ([real_e, fake_e], [real_s, fake_s])
    };
    BitProof {
        commitment,
        e0: e[0].to_bytes(),
        s0: s[0].to_bytes(),
        e1: e[1].to_bytes(),
        s1: s[1].to_bytes(),
    }
}

/// The bit commitment, if its OR proof holds
fn verify_bit(gens: &Generators, proof: &BitProof, index: usize, context: &[u8]) -> Option<RistrettoPoint> {
    let point = decode_point(&proof.commitment)?;
    let e0 = decode_scalar(&proof.e0)?;
    let s0 = decode_scalar(&proof.s0)?;
    let e1 = decode_scalar(&proof.e1)?;
    let s1 = decode_scalar(&proof.s1)?;

    let r0 = s0 * gens.h - e0 * point;
    let r1 = s1 * gens.h - e1 * (point - gens.g);
    if e0 + e1 != bit_challenge(context, index, &proof.commitment, &r0, &r1) {
        return None;
    }
    Some(point)
}

/// Context a range proof is bound to: the compressed commitment it covers
pub fn range_context(commitment: &[u8; 32]) -> Vec<u8> {
    let mut context = b"zkatdlog.output".to_vec();
    context.extend_from_slice(commitment);
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
    use interop_proofs::schnorr::hash_to_point;

    fn generators() -> Generators {
        Generators {
            g: RISTRETTO_BASEPOINT_POINT,
            h: hash_to_point(b"test.H"),
        }
    }

    #[test]
    fn test_value_in_range_verifies() {
        let gens = generators();
        for (value, bits) in [(0u64, 8u32), (1, 1), (255, 8), (1000, 16), (u64::MAX, 64)] {
            let blinding = random_scalar();
            let commitment = gens.commit(value, &blinding);
            let proof = RangeProof::prove(&gens, value, &blinding, bits, b"ctx").unwrap();
            assert!(proof.verify(&gens, &commitment, bits, b"ctx"), "{} in {} bits", value, bits);
            assert!(!proof.verify(&gens, &commitment, bits, b"other"));
        }
    }

    #[test]
    fn test_out_of_range_value_refused() {
        let gens = generators();
        assert!(RangeProof::prove(&gens, 256, &random_scalar(), 8, b"ctx").is_err());
        assert!(RangeProof::prove(&gens, 1, &random_scalar(), 0, b"ctx").is_err());
    }

    #[test]
    fn test_proof_does_not_transfer_to_other_commitment() {
        let gens = generators();
        let blinding = random_scalar();
        let proof = RangeProof::prove(&gens, 42, &blinding, 16, b"ctx").unwrap();

        assert!(!proof.verify(&gens, &gens.commit(43, &blinding), 16, b"ctx"));
        assert!(!proof.verify(&gens, &gens.commit(42, &blinding), 15, b"ctx"));

        // A bit commitment to 2 cannot carry a valid OR proof
        let mut forged = proof.clone();
        forged.bits[3].commitment = gens.commit(2, &random_scalar()).compress().to_bytes();
        assert!(!forged.verify(&gens, &gens.commit(42, &blinding), 16, b"ctx"));
    }

    #[test]
    fn test_bit_decomposition_prover() {
        let gens = generators();
        let blinding = random_scalar();
        let commitment = gens.commit(77, &blinding);
        let prover: &dyn RangeProver = &BitDecomposition;
        let proof = prover.prove(&gens, 77, &blinding, 8, b"ctx").unwrap();
        assert!(prover.verify(&gens, &commitment, &proof, 8, b"ctx"));
        assert!(!prover.verify(&gens, &commitment, &proof[1..], 8, b"ctx"));
        assert!(!prover.verify(&gens, &commitment, b"", 8, b"ctx"));
    }

    #[test]
    fn test_negative_value_has_no_proof() {
        let gens = generators();
        let blinding = random_scalar();
        // -950 as a group element
        let negative = -Scalar::from(950u64) * gens.g + blinding * gens.h;
        // The best a prover can do is prove the wrapped u64, which commits elsewhere
        let proof = RangeProof::prove(&gens, 950u64.wrapping_neg(), &blinding, 64, b"ctx").unwrap();
        assert!(!proof.verify(&gens, &negative, 64, b"ctx"));
    }
}
