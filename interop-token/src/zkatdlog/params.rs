use super::pedersen::Generators;
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use interop_core::driver::{PublicParameters, SerializedPublicParameters};
use interop_core::error::{InteropError, Result};
use interop_core::id::Identity;
use interop_proofs::schnorr::{decode_point, hash_to_point};
use serde::{Deserialize, Serialize};

/// Identifier of the committed-quantity scheme
pub const ZKATDLOG: &str = "zkatdlog";

/// Openings carry `u64` values
pub const MAX_ZK_PRECISION: u32 = 64;

/// Public parameters of a committed-quantity token instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkatdlogPublicParams {
    pub precision: u32,
    pub issuers: Vec<Identity>,
    pub auditors: Vec<Identity>,
    /// Compressed value generator
    pub g: [u8; 32],
    /// Compressed blinding generator, with unknown discrete log relative to `g`
    pub h: [u8; 32],
}

impl ZkatdlogPublicParams {
    pub fn new(precision: u32, issuers: Vec<Identity>, auditors: Vec<Identity>) -> Result<Self> {
        if precision == 0 || precision > MAX_ZK_PRECISION {
            return Err(InteropError::InvalidPrecision(precision));
        }
        Ok(ZkatdlogPublicParams {
            precision,
            issuers,
            auditors,
            g: RISTRETTO_BASEPOINT_POINT.compress().to_bytes(),
            h: hash_to_point(b"INTEROP_zkatdlog_H").compress().to_bytes(),
        })
    }

    pub fn from_raw(raw: &[u8]) -> Result<Self> {
        let pp: ZkatdlogPublicParams = serde_json::from_slice(raw)?;
        if pp.precision == 0 || pp.precision > MAX_ZK_PRECISION {
            return Err(InteropError::InvalidPrecision(pp.precision));
        }
        pp.generators()?;
        Ok(pp)
    }

    pub fn from_dyn(pp: &dyn PublicParameters) -> Result<Self> {
        if pp.identifier() != ZKATDLOG {
            return Err(InteropError::UnsupportedScheme(format!(
                "expected {} parameters, got {}",
                ZKATDLOG,
                pp.identifier()
            )));
        }
        let envelope = SerializedPublicParameters::from_bytes(&pp.to_envelope()?)?;
        Self::from_raw(&envelope.raw)
    }

    pub fn generators(&self) -> Result<Generators> {
        let g = decode_point(&self.g).ok_or_else(|| InteropError::Config("invalid generator G".to_string()))?;
        let h = decode_point(&self.h).ok_or_else(|| InteropError::Config("invalid generator H".to_string()))?;
        if g == h {
            return Err(InteropError::Config("generators must differ".to_string()));
        }
        Ok(Generators { g, h })
    }
}

impl PublicParameters for ZkatdlogPublicParams {
    fn identifier(&self) -> &str {
        ZKATDLOG
    }

    fn precision(&self) -> u32 {
        self.precision
    }

    fn issuers(&self) -> &[Identity] {
        &self.issuers
    }

    fn auditors(&self) -> &[Identity] {
        &self.auditors
    }

    fn to_envelope(&self) -> Result<Vec<u8>> {
        SerializedPublicParameters {
            identifier: ZKATDLOG.to_string(),
            raw: serde_json::to_vec(self)?,
        }
        .to_bytes()
    }
}
