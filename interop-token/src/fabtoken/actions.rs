use interop_core::action::ClaimLinkage;
use interop_core::error::{InteropError, Result};
use interop_core::id::{Identity, TokenId};
use interop_core::token::{Owner, Token};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Creates plaintext tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueAction {
    pub issuer: Identity,
    pub outputs: Vec<Token>,
    /// Set when the issue mirrors a pledge on another ledger
    pub linkage: Option<ClaimLinkage>,
    pub proof: Option<Vec<u8>>,
}

/// Spends plaintext tokens into new ones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferAction {
    pub inputs: Vec<TokenId>,
    pub outputs: Vec<Token>,
    pub attributes: BTreeMap<String, Vec<u8>>,
}

fn decode<T: for<'de> Deserialize<'de>>(kind: &str, raw: &[u8]) -> Result<T> {
    bincode::deserialize(raw).map_err(|e| InteropError::LedgerRejected(format!("malformed {} action: {}", kind, e)))
}

impl IssueAction {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        decode("issue", raw)
    }
}

impl TransferAction {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        decode("transfer", raw)
    }
}

/// Owners of a list of tokens, `None` for burns
pub fn owners(tokens: &[Token]) -> Result<Vec<Option<Owner>>> {
    tokens.iter().map(Token::owner).collect()
}
