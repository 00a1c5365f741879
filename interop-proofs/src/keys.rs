//! State keys shared by validators, ledgers and verifiers, and the relay
//! query names.

use interop_core::error::{InteropError, Result};
use interop_core::id::TokenId;

pub const QUERY_PUBLIC_PARAMS: &str = "queryPublicParams";
pub const QUERY_TOKEN_EXISTENCE: &str = "proofOfTokenExistence";
pub const QUERY_TOKEN_DOES_NOT_EXIST: &str = "proofOfTokenDoesNotExist";
pub const QUERY_TOKEN_EXISTS_WITH_METADATA: &str = "proofOfTokenExistsWithMetadata";

const MIN_UNICODE_RUNE: char = '\u{0}';

// Composite keys use the null rune as separator, so no key of one kind is a
// prefix of a key of another kind.
fn composite_key(object_type: &str, attributes: &[&str]) -> String {
    let mut key = String::new();
    key.push(MIN_UNICODE_RUNE);
    key.push_str(object_type);
    key.push(MIN_UNICODE_RUNE);
    for attribute in attributes {
        key.push_str(attribute);
        key.push(MIN_UNICODE_RUNE);
    }
    key
}

pub fn public_parameters_key() -> String {
    composite_key("se.pp", &[])
}

/// Key of an unspent output
pub fn output_key(id: &TokenId) -> String {
    composite_key("tok.out", &[id.tx_id.as_str(), &id.index.to_string()])
}

/// Prefix of all output keys
pub fn output_key_prefix() -> String {
    composite_key("tok.out", &[])
}

/// Key holding the plaintext of a live pledged token
pub fn existence_key(id: &TokenId) -> String {
    composite_key("pledge.exists", &[id.tx_id.as_str(), &id.index.to_string()])
}

/// Key holding the linkage of a claim of `id` pledged on `origin`
pub fn metadata_key(id: &TokenId, origin: &str) -> String {
    composite_key("pledge.claim", &[origin, id.tx_id.as_str(), &id.index.to_string()])
}

/// Key recording how a pledge on this ledger was released
pub fn outcome_key(id: &TokenId) -> String {
    composite_key("pledge.outcome", &[id.tx_id.as_str(), &id.index.to_string()])
}

/// How a pledged output left the origin ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PledgeOutcome {
    Redeemed,
    Reclaimed,
}

impl PledgeOutcome {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            PledgeOutcome::Redeemed => b"redeemed",
            PledgeOutcome::Reclaimed => b"reclaimed",
        }
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        match raw {
            b"redeemed" => Ok(PledgeOutcome::Redeemed),
            b"reclaimed" => Ok(PledgeOutcome::Reclaimed),
            other => Err(InteropError::Serialization(format!(
                "unknown pledge outcome [{}]",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}
