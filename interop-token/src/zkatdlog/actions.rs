use super::pedersen::{Generators, Opening};
use interop_core::action::ClaimLinkage;
use interop_core::error::{InteropError, Result};
use interop_core::id::{Identity, TokenId, TxId};
use interop_core::quantity::Quantity;
use interop_core::token::{Owner, Token};
use interop_proofs::Signature;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An output whose quantity is hidden in a Pedersen commitment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedOutput {
    /// Owner envelope, empty for burns
    pub owner: Vec<u8>,
    pub token_type: String,
    pub commitment: [u8; 32],
}

impl CommittedOutput {
    pub fn owner(&self) -> Result<Option<Owner>> {
        if self.owner.is_empty() {
            return Ok(None);
        }
        Owner::from_raw(&self.owner).map(Some)
    }

    /// The plaintext token, given the opening of the commitment
    pub fn open(&self, opening: &Opening, generators: &Generators, precision: u32) -> Result<Token> {
        if !opening.opens(generators, &self.commitment) {
            return Err(InteropError::InvalidRequest(format!(
                "opening does not match the [{}] commitment",
                self.token_type
            )));
        }
        Ok(Token {
            owner: self.owner.clone(),
            token_type: self.token_type.clone(),
            quantity: Quantity::from_u64(opening.value, precision)?.to_hex(),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(raw)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkIssueAction {
    pub issuer: Identity,
    pub outputs: Vec<CommittedOutput>,
    /// Openings of pledge outputs, `None` for the others
    pub disclosures: Vec<Option<Opening>>,
    /// Encoded range proofs, one per output
    pub range_proofs: Vec<Vec<u8>>,
    pub linkage: Option<ClaimLinkage>,
    pub proof: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkTransferAction {
    pub inputs: Vec<TokenId>,
    pub outputs: Vec<CommittedOutput>,
    pub disclosures: Vec<Option<Opening>>,
    pub range_proofs: Vec<Vec<u8>>,
    /// Per type, proof that inputs minus outputs commit to zero
    pub balance_proofs: BTreeMap<String, Signature>,
    pub attributes: BTreeMap<String, Vec<u8>>,
}

fn decode<T: for<'de> Deserialize<'de>>(kind: &str, raw: &[u8]) -> Result<T> {
    bincode::deserialize(raw).map_err(|e| InteropError::LedgerRejected(format!("malformed {} action: {}", kind, e)))
}

impl ZkIssueAction {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        decode("issue", raw)
    }
}

impl ZkTransferAction {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        decode("transfer", raw)
    }
}

/// Context the balance proof of one type is bound to
pub fn balance_context(anchor: &TxId, token_type: &str) -> Vec<u8> {
    let mut context = b"zkatdlog.balance".to_vec();
    context.push(0);
    context.extend_from_slice(anchor.as_str().as_bytes());
    context.push(0);
    context.extend_from_slice(token_type.as_bytes());
    context
}
