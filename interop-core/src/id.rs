use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hash a list of seeds under a domain separator
pub fn domain_hash(domain: &[u8], seeds: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(domain);

    // Length-prefix every seed so that adjacent seeds cannot be shifted into each other
    for seed in seeds {
        hasher.update((seed.len() as u64).to_le_bytes());
        hasher.update(seed);
    }

    hasher.finalize().into()
}

// Identity is the opaque public identity of a party: a wallet owner, an issuer or an auditor.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Identity(Vec<u8>);

impl Identity {
    pub fn new(bytes: Vec<u8>) -> Self {
        Identity(bytes)
    }

    /// Deterministic identity for a named party
    pub fn from_label(label: &str) -> Self {
        Identity(domain_hash(b"INTEROP_Identity", &[label.as_bytes()]).to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Format as a hex string with a prefix of the first 6 bytes
        let end = self.0.len().min(6);
        write!(f, "id:{}", hex::encode(&self.0[..end]))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Transaction identifier, the anchor of a token request
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TxId(String);

impl TxId {
    pub fn new(id: impl Into<String>) -> Self {
        TxId(id.into())
    }

    pub fn derive(seeds: &[&[u8]]) -> Self {
        TxId(hex::encode(domain_hash(b"INTEROP_Tx", seeds)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one output of a committed transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId {
    pub tx_id: TxId,
    pub index: u32,
}

impl TokenId {
    pub fn new(tx_id: TxId, index: u32) -> Self {
        TokenId { tx_id, index }
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", self.tx_id, self.index)
    }
}

/// Correlates claim and reclaim requests with the original lock
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PledgeId(String);

impl PledgeId {
    pub fn new(id: impl Into<String>) -> Self {
        PledgeId(id.into())
    }

    /// Derive the pledge id from the pledge transaction and its sender
    pub fn derive(tx_id: &TxId, sender: &Identity) -> Self {
        PledgeId(hex::encode(domain_hash(
            b"INTEROP_Pledge",
            &[tx_id.as_str().as_bytes(), sender.as_bytes()],
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PledgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_hash_separates_seeds() {
        let a = domain_hash(b"D", &[b"ab", b"c"]);
        let b = domain_hash(b"D", &[b"a", b"bc"]);
        assert_ne!(a, b);
        assert_eq!(a, domain_hash(b"D", &[b"ab", b"c"]));
        assert_ne!(a, domain_hash(b"E", &[b"ab", b"c"]));
    }

    #[test]
    fn test_identity_from_label() {
        let alice = Identity::from_label("alice");
        assert_eq!(alice, Identity::from_label("alice"));
        assert_ne!(alice, Identity::from_label("bob"));
        assert!(!alice.is_none());
        assert!(Identity::default().is_none());
        assert!(alice.to_string().starts_with("id:"));
    }

    #[test]
    fn test_pledge_id_is_unique_per_tx() {
        let alice = Identity::from_label("alice");
        let tx1 = TxId::derive(&[b"1"]);
        let tx2 = TxId::derive(&[b"2"]);
        assert_ne!(PledgeId::derive(&tx1, &alice), PledgeId::derive(&tx2, &alice));
        assert_eq!(PledgeId::derive(&tx1, &alice), PledgeId::derive(&tx1, &alice));
    }

    #[test]
    fn test_token_id_display() {
        let id = TokenId::new(TxId::new("abc"), 3);
        assert_eq!(id.to_string(), "[abc:3]");
    }
}
