use interop_core::driver::{PublicParameters, SerializedPublicParameters};
use interop_core::error::{InteropError, Result};
use interop_core::id::Identity;
use interop_core::quantity::MAX_PRECISION;
use serde::{Deserialize, Serialize};

/// Identifier of the plaintext scheme
pub const FABTOKEN: &str = "fabtoken";

/// Public parameters of a plaintext token instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabtokenPublicParams {
    pub precision: u32,
    pub issuers: Vec<Identity>,
    pub auditors: Vec<Identity>,
}

impl FabtokenPublicParams {
    pub fn new(precision: u32, issuers: Vec<Identity>, auditors: Vec<Identity>) -> Result<Self> {
        if precision == 0 || precision > MAX_PRECISION {
            return Err(InteropError::InvalidPrecision(precision));
        }
        Ok(FabtokenPublicParams {
            precision,
            issuers,
            auditors,
        })
    }

    /// Parse the body of a `fabtoken` envelope
    pub fn from_raw(raw: &[u8]) -> Result<Self> {
        let pp: FabtokenPublicParams = serde_json::from_slice(raw)?;
        // Re-run the constructor checks on untrusted input
        Self::new(pp.precision, pp.issuers, pp.auditors)
    }

    /// Recover the concrete parameters behind a trait object
    pub fn from_dyn(pp: &dyn PublicParameters) -> Result<Self> {
        if pp.identifier() != FABTOKEN {
            return Err(InteropError::UnsupportedScheme(format!(
                "expected {} parameters, got {}",
                FABTOKEN,
                pp.identifier()
            )));
        }
        let envelope = SerializedPublicParameters::from_bytes(&pp.to_envelope()?)?;
        Self::from_raw(&envelope.raw)
    }
}

impl PublicParameters for FabtokenPublicParams {
    fn identifier(&self) -> &str {
        FABTOKEN
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
            identifier: FABTOKEN.to_string(),
            raw: serde_json::to_vec(self)?,
        }
        .to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_envelope() {
        let pp = FabtokenPublicParams::new(64, vec![Identity::from_label("issuer")], vec![]).unwrap();
        let envelope = SerializedPublicParameters::from_bytes(&pp.to_envelope().unwrap()).unwrap();
        assert_eq!(envelope.identifier, FABTOKEN);
        assert_eq!(FabtokenPublicParams::from_raw(&envelope.raw).unwrap(), pp);
        assert_eq!(FabtokenPublicParams::from_dyn(&pp).unwrap(), pp);
    }

    #[test]
    fn test_invalid_precision() {
        assert!(matches!(
            FabtokenPublicParams::new(0, vec![], vec![]),
            Err(InteropError::InvalidPrecision(0))
        ));
        let raw = br#"{"precision":129,"issuers":[],"auditors":[]}"#;
        assert!(FabtokenPublicParams::from_raw(raw).is_err());
    }
}
