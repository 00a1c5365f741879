use crate::error::Result;
use crate::id::{Identity, TokenId, TxId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Transfer attribute carrying the pledge id of a pledge transaction
pub const PLEDGE_ID_ATTRIBUTE: &str = "pledge.id";
/// Transfer attribute carrying the preimage that unlocks an HTLC input
pub const HTLC_PREIMAGE_ATTRIBUTE: &str = "htlc.preimage";

/// A request submitted to a ledger: scheme-encoded issue and transfer actions
/// anchored to one transaction id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    pub anchor: TxId,
    pub issues: Vec<Vec<u8>>,
    pub transfers: Vec<Vec<u8>>,
    /// Parties that endorsed the request
    pub signers: Vec<Identity>,
    /// Auditor that inspected the request, if any
    pub auditor: Option<Identity>,
}

impl TokenRequest {
    pub fn new(anchor: TxId) -> Self {
        TokenRequest {
            anchor,
            ..Default::default()
        }
    }

    pub fn is_signed_by(&self, identity: &Identity) -> bool {
        self.signers.iter().any(|s| s == identity)
    }

    pub fn add_signer(&mut self, identity: &Identity) {
        if !self.is_signed_by(identity) {
            self.signers.push(identity.clone());
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(raw)?)
    }
}

/// Links a claim issued on the destination network to the pledged token it mirrors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimLinkage {
    pub origin_token_id: TokenId,
    pub origin_network: String,
    /// Claims are only accepted strictly before the pledge deadline
    pub deadline: DateTime<Utc>,
}

impl ClaimLinkage {
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IssueOptions {
    pub linkage: Option<ClaimLinkage>,
    /// The existence proof justifying a claim
    pub proof: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    pub attributes: BTreeMap<String, Vec<u8>>,
}

impl TransferOptions {
    pub fn with_attribute(mut self, key: &str, value: &[u8]) -> Self {
        self.attributes.insert(key.to_string(), value.to_vec());
        self
    }
}

/// Audit information a wallet discloses to the auditor about one of its identities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInfo {
    pub identity: Identity,
    pub enrollment_id: String,
}

impl AuditInfo {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}

/// Audit information of a script owner: the sender side and the recipient side.
/// For pledges the recipient side holds the issuer's audit info.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptAuditInfo {
    pub sender: Vec<u8>,
    pub recipient: Vec<u8>,
}

impl ScriptAuditInfo {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}

/// Off-ledger companion of an issue action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueMetadata {
    pub issuer: Identity,
    pub outputs: Vec<Vec<u8>>,
    /// Scheme-specific opening of each output
    pub outputs_metadata: Vec<Vec<u8>>,
    pub receivers: Vec<Identity>,
    pub receiver_audit_infos: Vec<Vec<u8>>,
}

/// Off-ledger companion of a transfer action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMetadata {
    pub token_ids: Vec<TokenId>,
    pub senders: Vec<Identity>,
    pub sender_audit_infos: Vec<Vec<u8>>,
    /// Scheme-specific opening of each input
    pub inputs_metadata: Vec<Vec<u8>>,
    pub outputs: Vec<Vec<u8>>,
    pub outputs_metadata: Vec<Vec<u8>>,
    /// Empty identity for burn outputs
    pub receivers: Vec<Identity>,
    pub receiver_is_sender: Vec<bool>,
    pub receiver_audit_infos: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequestMetadata {
    pub issues: Vec<IssueMetadata>,
    pub transfers: Vec<TransferMetadata>,
    pub application: BTreeMap<String, Vec<u8>>,
}

impl TokenRequestMetadata {
    /// Output ids with their raw output and opening, in ledger order:
    /// issue outputs first, then transfer outputs, burns included
    pub fn outputs(&self, anchor: &TxId) -> Vec<(TokenId, &[u8], &[u8])> {
        let issued = self
            .issues
            .iter()
            .flat_map(|m| m.outputs.iter().zip(m.outputs_metadata.iter()));
        let transferred = self
            .transfers
            .iter()
            .flat_map(|m| m.outputs.iter().zip(m.outputs_metadata.iter()));
        issued
            .chain(transferred)
            .enumerate()
            .map(|(i, (out, meta))| (TokenId::new(anchor.clone(), i as u32), out.as_slice(), meta.as_slice()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_ids_follow_action_order() {
        let metadata = TokenRequestMetadata {
            issues: vec![IssueMetadata {
                outputs: vec![b"i0".to_vec()],
                outputs_metadata: vec![b"m0".to_vec()],
                ..Default::default()
            }],
            transfers: vec![TransferMetadata {
                outputs: vec![b"t0".to_vec(), b"t1".to_vec()],
                outputs_metadata: vec![b"m1".to_vec(), b"m2".to_vec()],
                ..Default::default()
            }],
            ..Default::default()
        };
        let anchor = TxId::new("tx");
        let outputs = metadata.outputs(&anchor);
        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0].0, TokenId::new(anchor.clone(), 0));
        assert_eq!(outputs[2].0, TokenId::new(anchor, 2));
        assert_eq!(outputs[2].1, b"t1");
        assert_eq!(outputs[2].2, b"m2");
    }

    #[test]
    fn test_signers_are_deduplicated() {
        let mut request = TokenRequest::new(TxId::new("tx"));
        let alice = Identity::from_label("alice");
        request.add_signer(&alice);
        request.add_signer(&alice);
        assert_eq!(request.signers.len(), 1);
        assert!(request.is_signed_by(&alice));

        let decoded = TokenRequest::from_bytes(&request.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, request);
    }
}
