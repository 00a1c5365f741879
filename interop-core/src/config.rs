use crate::error::{InteropError, Result};
use crate::id::Identity;
use crate::ledger_url::{LedgerUrl, TmsId};
use crate::quantity::MAX_PRECISION;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

fn default_precision() -> u32 {
    64
}

fn default_poll_interval_ms() -> u64 {
    50
}

/// One token management scope hosted by this node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmsConfig {
    #[serde(flatten)]
    pub id: TmsId,
    /// Name of the token driver, `fabtoken` or `zkatdlog`
    pub driver: String,
    #[serde(default = "default_precision")]
    pub precision: u32,
    /// Labels of the parties allowed to issue
    #[serde(default)]
    pub issuers: Vec<String>,
    #[serde(default)]
    pub auditors: Vec<String>,
}

impl TmsConfig {
    pub fn issuer_identities(&self) -> Vec<Identity> {
        self.issuers.iter().map(|l| Identity::from_label(l)).collect()
    }

    pub fn auditor_identities(&self) -> Vec<Identity> {
        self.auditors.iter().map(|l| Identity::from_label(l)).collect()
    }

    pub fn url(&self) -> Result<LedgerUrl> {
        LedgerUrl::fabric(&self.id)
    }
}

/// Committer key trusted for a remote ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustAnchorConfig {
    pub url: String,
    /// Hex encoded compressed Ristretto point
    pub committer_key: String,
}

impl TrustAnchorConfig {
    pub fn key_bytes(&self) -> Result<[u8; 32]> {
        let raw = hex::decode(&self.committer_key)
            .map_err(|e| InteropError::Config(format!("invalid committer key for [{}]: {}", self.url, e)))?;
        raw.try_into()
            .map_err(|_| InteropError::Config(format!("committer key for [{}] must be 32 bytes", self.url)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ScanConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Node configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteropConfig {
    #[serde(default)]
    pub tms: Vec<TmsConfig>,
    #[serde(default)]
    pub trust_anchors: Vec<TrustAnchorConfig>,
    #[serde(default)]
    pub scan: ScanConfig,
}

impl InteropConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: InteropConfig =
            serde_json::from_str(raw).map_err(|e| InteropError::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Reject bad precisions, unnamed drivers and duplicated scopes
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for tms in &self.tms {
            if tms.precision == 0 || tms.precision > MAX_PRECISION {
                return Err(InteropError::InvalidPrecision(tms.precision));
            }
            if tms.driver.is_empty() {
                return Err(InteropError::Config(format!("tms [{}] has no driver", tms.id)));
            }
            tms.url()?;
            if !seen.insert(tms.id.clone()) {
                return Err(InteropError::Config(format!("tms [{}] configured twice", tms.id)));
            }
        }
        for anchor in &self.trust_anchors {
            LedgerUrl::parse(&anchor.url)?;
            anchor.key_bytes()?;
        }
        Ok(())
    }

    pub fn tms(&self, id: &TmsId) -> Option<&TmsConfig> {
        self.tms.iter().find(|t| &t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CONFIG: &str = r#"{
        "tms": [
            {"network": "alpha", "driver": "fabtoken", "issuers": ["issuerAlpha"]},
            {"network": "beta", "driver": "zkatdlog", "precision": 32}
        ],
        "trust_anchors": [
            {"url": "fabric://beta../", "committer_key": "0101010101010101010101010101010101010101010101010101010101010101"}
        ]
    }"#;

    #[test]
    fn test_parse_config() {
        let config = InteropConfig::from_json_str(CONFIG).unwrap();
        assert_eq!(config.tms.len(), 2);
        let alpha = config.tms(&TmsId::network("alpha")).unwrap();
        assert_eq!(alpha.precision, 64);
        assert_eq!(alpha.issuer_identities(), vec![Identity::from_label("issuerAlpha")]);
        assert_eq!(alpha.url().unwrap().to_string(), "fabric://alpha../");
        assert_eq!(config.trust_anchors[0].key_bytes().unwrap(), [1u8; 32]);
        assert_eq!(config.scan.poll_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_reject_invalid_config() {
        let bad_precision = r#"{"tms": [{"network": "alpha", "driver": "fabtoken", "precision": 0}]}"#;
        assert!(matches!(
            InteropConfig::from_json_str(bad_precision),
            Err(InteropError::InvalidPrecision(0))
        ));

        let duplicate = r#"{"tms": [
            {"network": "alpha", "driver": "fabtoken"},
            {"network": "alpha", "driver": "zkatdlog"}
        ]}"#;
        assert!(matches!(InteropConfig::from_json_str(duplicate), Err(InteropError::Config(_))));

        let short_key = r#"{"trust_anchors": [{"url": "fabric://beta../", "committer_key": "0101"}]}"#;
        assert!(InteropConfig::from_json_str(short_key).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        let config = InteropConfig::from_file(file.path()).unwrap();
        assert_eq!(config.tms[1].driver, "zkatdlog");
    }
}
