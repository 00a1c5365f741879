use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity as _;
use interop_core::error::{InteropError, Result};
use interop_proofs::schnorr::{decode_point, decode_scalar, random_scalar};
use serde::{Deserialize, Serialize};

/// Generators of the commitment scheme, `C = v·G + r·H`
#[derive(Debug, Clone, Copy)]
pub struct Generators {
    pub g: RistrettoPoint,
    pub h: RistrettoPoint,
}

impl Generators {
    pub fn commit(&self, value: u64, blinding: &Scalar) -> RistrettoPoint {
        Scalar::from(value) * self.g + blinding * self.h
    }
}

/// The opening of a commitment, held by the owner and disclosed to the auditor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opening {
    pub value: u64,
    pub blinding: [u8; 32],
}

impl Opening {
    /// Fresh opening of `value` with a random blinding factor
    pub fn random(value: u64) -> Self {
        Opening {
            value,
            blinding: random_scalar().to_bytes(),
        }
    }

    pub fn blinding(&self) -> Result<Scalar> {
        decode_scalar(&self.blinding)
            .ok_or_else(|| InteropError::InvalidRequest("non-canonical blinding factor".to_string()))
    }

    /// Compressed commitment to this opening
    pub fn commit(&self, generators: &Generators) -> Result<[u8; 32]> {
        Ok(generators
            .commit(self.value, &self.blinding()?)
            .compress()
            .to_bytes())
    }

    /// True if the opening matches a compressed commitment
    pub fn opens(&self, generators: &Generators, commitment: &[u8; 32]) -> bool {
        matches!(self.commit(generators), Ok(c) if &c == commitment)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(raw)?)
    }
}

/// Sum of compressed commitments
pub fn sum_commitments<'a>(commitments: impl IntoIterator<Item = &'a [u8; 32]>) -> Result<RistrettoPoint> {
    commitments
        .into_iter()
        .try_fold(RistrettoPoint::identity(), |acc, c| {
            decode_point(c)
                .map(|p| acc + p)
                .ok_or_else(|| InteropError::InvalidRequest("invalid commitment point".to_string()))
        })
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
    fn test_commitments_are_homomorphic() {
        let gens = generators();
        let a = Opening::random(30);
        let b = Opening::random(20);
        let sum = sum_commitments([&a.commit(&gens).unwrap(), &b.commit(&gens).unwrap()]).unwrap();

        let rho = a.blinding().unwrap() + b.blinding().unwrap();
        assert_eq!(sum, gens.commit(50, &rho));
    }

    #[test]
    fn test_opening_checks_value() {
        let gens = generators();
        let opening = Opening::random(7);
        let commitment = opening.commit(&gens).unwrap();
        assert!(opening.opens(&gens, &commitment));

        let forged = Opening { value: 8, ..opening };
        assert!(!forged.opens(&gens, &commitment));

        let decoded = Opening::from_bytes(&opening.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, opening);
    }
}
