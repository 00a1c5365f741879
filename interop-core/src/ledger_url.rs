use crate::error::{InteropError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Scheme of ledgers reached through the relay
pub const FABRIC_SCHEME: &str = "fabric";

/// Identifies one token management scope: network, channel and namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TmsId {
    pub network: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub namespace: String,
}

impl TmsId {
    pub fn new(network: &str, channel: &str, namespace: &str) -> Self {
        TmsId {
            network: network.to_string(),
            channel: channel.to_string(),
            namespace: namespace.to_string(),
        }
    }

    pub fn network(network: &str) -> Self {
        Self::new(network, "", "")
    }
}

impl fmt::Display for TmsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.network, self.channel, self.namespace)
    }
}

/// Reference to a ledger, `<scheme>://<network>.<channel>.<namespace>/`.
///
/// Used both to address relay queries and as the destination network of a
/// pledge script.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerUrl {
    scheme: String,
    tms_id: TmsId,
}

impl LedgerUrl {
    pub fn fabric(tms_id: &TmsId) -> Result<Self> {
        Self::new(FABRIC_SCHEME, tms_id)
    }

    pub fn new(scheme: &str, tms_id: &TmsId) -> Result<Self> {
        if tms_id.network.is_empty() {
            return Err(InteropError::InvalidUrl("network must not be empty".to_string()));
        }
        for part in [&tms_id.network, &tms_id.channel, &tms_id.namespace] {
            if part.contains('.') || part.contains('/') {
                return Err(InteropError::InvalidUrl(format!(
                    "component [{}] must not contain '.' or '/'",
                    part
                )));
            }
        }
        Ok(LedgerUrl {
            scheme: scheme.to_string(),
            tms_id: tms_id.clone(),
        })
    }

    /// Parse a ledger reference back into its scheme and TMS id
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw)?;
        let host = url
            .host_str()
            .ok_or_else(|| InteropError::InvalidUrl(format!("missing host in [{}]", raw)))?;
        let parts: Vec<&str> = host.split('.').collect();
        if parts.len() != 3 {
            return Err(InteropError::InvalidUrl(format!(
                "expected <network>.<channel>.<namespace>, got [{}]",
                host
            )));
        }
        let path = url.path();
        if !path.is_empty() && path != "/" {
            return Err(InteropError::InvalidUrl(format!("unexpected path in [{}]", raw)));
        }
        Self::new(url.scheme(), &TmsId::new(parts[0], parts[1], parts[2]))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn tms_id(&self) -> &TmsId {
        &self.tms_id
    }
}

impl fmt::Display for LedgerUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}.{}.{}/",
            self.scheme, self.tms_id.network, self.tms_id.channel, self.tms_id.namespace
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fabric_url_round_trip() {
        let tms = TmsId::network("alpha");
        let url = LedgerUrl::fabric(&tms).unwrap();
        assert_eq!(url.to_string(), "fabric://alpha../");

        let parsed = LedgerUrl::parse("fabric://alpha../").unwrap();
        assert_eq!(parsed.tms_id(), &tms);
        assert_eq!(parsed.scheme(), FABRIC_SCHEME);

        let full = TmsId::new("beta", "testchannel", "zkat");
        let url = LedgerUrl::fabric(&full).unwrap();
        assert_eq!(LedgerUrl::parse(&url.to_string()).unwrap(), url);
    }

    #[test]
    fn test_invalid_urls() {
        assert!(LedgerUrl::parse("not a url").is_err());
        assert!(LedgerUrl::parse("fabric://alpha/").is_err());
        assert!(LedgerUrl::parse("fabric://.chan.ns/").is_err());
        assert!(LedgerUrl::parse("fabric://a.b.c/extra").is_err());
        assert!(LedgerUrl::fabric(&TmsId::network("al.pha")).is_err());
    }
}
