use crate::error::{InteropError, Result};
use crate::id::{Identity, PledgeId, TokenId};
use crate::quantity::Quantity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Tag of an owner that is a plain serialized identity
pub const SERIALIZED_IDENTITY_TYPE: &str = "si";
/// Tag of an owner locked by a hash time lock
pub const HTLC_SCRIPT_TYPE: &str = "htlc";
/// Tag of an owner locked by a pledge
pub const PLEDGE_SCRIPT_TYPE: &str = "pledge";

// The on-ledger envelope of an owner: a type tag and the tag-specific body.
#[derive(Serialize, Deserialize)]
struct TypedOwner {
    #[serde(rename = "type")]
    owner_type: String,
    identity: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashFunction {
    Sha256,
    Blake3,
}

impl HashFunction {
    pub fn digest(&self, preimage: &[u8]) -> Vec<u8> {
        match self {
            HashFunction::Sha256 => Sha256::digest(preimage).to_vec(),
            HashFunction::Blake3 => blake3::hash(preimage).as_bytes().to_vec(),
        }
    }
}

/// Hash time lock: the recipient unlocks with a preimage before the deadline,
/// the sender takes the token back afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtlcScript {
    pub sender: Identity,
    pub recipient: Identity,
    pub deadline: DateTime<Utc>,
    pub hash: Vec<u8>,
    pub hash_func: HashFunction,
}

impl HtlcScript {
    pub fn matches_preimage(&self, preimage: &[u8]) -> bool {
        self.hash_func.digest(preimage) == self.hash
    }
}

/// Pledge lock: the issuer burns the token once a claim is proven on the
/// destination network, the sender reclaims it after the deadline otherwise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PledgeScript {
    pub sender: Identity,
    pub recipient: Identity,
    pub issuer: Identity,
    pub id: PledgeId,
    pub deadline: DateTime<Utc>,
    pub destination_network: String,
}

/// Who may spend a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    Identity(Identity),
    Htlc(HtlcScript),
    Pledge(PledgeScript),
}

impl Owner {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Owner::Identity(_) => SERIALIZED_IDENTITY_TYPE,
            Owner::Htlc(_) => HTLC_SCRIPT_TYPE,
            Owner::Pledge(_) => PLEDGE_SCRIPT_TYPE,
        }
    }

    /// Serialize the owner into its typed envelope
    pub fn to_raw(&self) -> Result<Vec<u8>> {
        let identity = match self {
            Owner::Identity(id) => id.as_bytes().to_vec(),
            Owner::Htlc(script) => serde_json::to_vec(script)?,
            Owner::Pledge(script) => serde_json::to_vec(script)?,
        };
        let typed = TypedOwner {
            owner_type: self.type_tag().to_string(),
            identity,
        };
        Ok(serde_json::to_vec(&typed)?)
    }

    /// Parse a typed envelope, rejecting tags this crate does not know
    pub fn from_raw(raw: &[u8]) -> Result<Owner> {
        let typed: TypedOwner = serde_json::from_slice(raw)
            .map_err(|e| InteropError::MalformedOwner(format!("invalid owner envelope: {}", e)))?;
        match typed.owner_type.as_str() {
            SERIALIZED_IDENTITY_TYPE => Ok(Owner::Identity(Identity::new(typed.identity))),
            HTLC_SCRIPT_TYPE => serde_json::from_slice(&typed.identity)
                .map(Owner::Htlc)
                .map_err(|e| InteropError::MalformedOwner(format!("invalid htlc script: {}", e))),
            PLEDGE_SCRIPT_TYPE => serde_json::from_slice(&typed.identity)
                .map(Owner::Pledge)
                .map_err(|e| InteropError::MalformedOwner(format!("invalid pledge script: {}", e))),
            other => Err(InteropError::UnknownOwnerType(other.to_string())),
        }
    }

    /// The counterparty that receives an output with this owner.
    ///
    /// Plain identities receive directly, HTLC outputs go to their recipient
    /// and pledge outputs go to the issuer, the only party able to redeem them.
    pub fn receiver(&self) -> &Identity {
        match self {
            Owner::Identity(id) => id,
            Owner::Htlc(script) => &script.recipient,
            Owner::Pledge(script) => &script.issuer,
        }
    }

    /// True if the identity plays any role in this owner
    pub fn involves(&self, identity: &Identity) -> bool {
        match self {
            Owner::Identity(id) => id == identity,
            Owner::Htlc(script) => &script.sender == identity || &script.recipient == identity,
            Owner::Pledge(script) => {
                &script.sender == identity
                    || &script.recipient == identity
                    || &script.issuer == identity
            }
        }
    }

    pub fn as_identity(&self) -> Option<&Identity> {
        match self {
            Owner::Identity(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_pledge(&self) -> Option<&PledgeScript> {
        match self {
            Owner::Pledge(script) => Some(script),
            _ => None,
        }
    }
}

/// A plaintext token: owner envelope, type and hex quantity.
///
/// An empty owner marks a burned token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub owner: Vec<u8>,
    pub token_type: String,
    pub quantity: String,
}

impl Token {
    pub fn new(owner: &Owner, token_type: &str, quantity: &Quantity) -> Result<Self> {
        Ok(Token {
            owner: owner.to_raw()?,
            token_type: token_type.to_string(),
            quantity: quantity.to_hex(),
        })
    }

    pub fn burn(token_type: &str, quantity: &Quantity) -> Self {
        Token {
            owner: Vec::new(),
            token_type: token_type.to_string(),
            quantity: quantity.to_hex(),
        }
    }

    pub fn is_burn(&self) -> bool {
        self.owner.is_empty()
    }

    /// The parsed owner, `None` for burned tokens
    pub fn owner(&self) -> Result<Option<Owner>> {
        if self.is_burn() {
            return Ok(None);
        }
        Owner::from_raw(&self.owner).map(Some)
    }

    pub fn quantity(&self, precision: u32) -> Result<Quantity> {
        Quantity::from_hex(&self.quantity, precision)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}

/// A token that is still spendable, as seen by a vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentToken {
    pub id: TokenId,
    pub token: Token,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::TxId;
    use chrono::TimeZone;

    fn pledge_script() -> PledgeScript {
        let sender = Identity::from_label("alice");
        PledgeScript {
            sender: sender.clone(),
            recipient: Identity::from_label("bob"),
            issuer: Identity::from_label("issuer"),
            id: PledgeId::derive(&TxId::new("tx1"), &sender),
            deadline: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            destination_network: "fabric://beta../".to_string(),
        }
    }

    #[test]
    fn test_owner_round_trip() {
        let owners = vec![
            Owner::Identity(Identity::from_label("alice")),
            Owner::Pledge(pledge_script()),
            Owner::Htlc(HtlcScript {
                sender: Identity::from_label("alice"),
                recipient: Identity::from_label("bob"),
                deadline: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
                hash: HashFunction::Sha256.digest(b"secret"),
                hash_func: HashFunction::Sha256,
            }),
        ];
        for owner in owners {
            let raw = owner.to_raw().unwrap();
            assert_eq!(Owner::from_raw(&raw).unwrap(), owner);
        }
    }

    #[test]
    fn test_unknown_owner_type() {
        let raw = br#"{"type":"multisig","identity":[1,2,3]}"#;
        match Owner::from_raw(raw) {
            Err(InteropError::UnknownOwnerType(tag)) => assert_eq!(tag, "multisig"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(Owner::from_raw(b"not json"), Err(InteropError::MalformedOwner(_))));
        let bad_script = br#"{"type":"pledge","identity":[1,2,3]}"#;
        assert!(matches!(Owner::from_raw(bad_script), Err(InteropError::MalformedOwner(_))));
    }

    #[test]
    fn test_receiver_resolution() {
        let script = pledge_script();
        let owner = Owner::Pledge(script.clone());
        assert_eq!(owner.receiver(), &script.issuer);
        assert!(owner.involves(&script.sender));
        assert!(owner.involves(&script.recipient));
        assert!(!owner.involves(&Identity::from_label("mallory")));

        let plain = Owner::Identity(Identity::from_label("bob"));
        assert_eq!(plain.receiver(), &Identity::from_label("bob"));
    }

    #[test]
    fn test_htlc_preimage() {
        for func in [HashFunction::Sha256, HashFunction::Blake3] {
            let script = HtlcScript {
                sender: Identity::from_label("alice"),
                recipient: Identity::from_label("bob"),
                deadline: Utc::now(),
                hash: func.digest(b"secret"),
                hash_func: func,
            };
            assert!(script.matches_preimage(b"secret"));
            assert!(!script.matches_preimage(b"guess"));
        }
    }

    #[test]
    fn test_burn_token() {
        let q = Quantity::from_u64(5, 64).unwrap();
        let token = Token::burn("USD", &q);
        assert!(token.is_burn());
        assert!(token.owner().unwrap().is_none());
        assert_eq!(token.quantity(64).unwrap(), q);
    }
}
