use crate::adapter::{LedgerProof, ProofAdapter};
use chrono::{DateTime, Utc};
use interop_core::action::ClaimLinkage;
use interop_core::driver::{PledgeInfo, PledgeVault, StateVerifier};
use interop_core::error::{InteropError, MismatchField, Result};
use interop_core::id::TokenId;
use interop_core::quantity::Quantity;
use interop_core::token::{Owner, Token};
use interop_proofs::keys::{existence_key, metadata_key};
use interop_proofs::ProofQuery;
use log::debug;
use std::cmp::Ordering;
use std::sync::Arc;

/// Checks that proofs produced by one ledger say what the protocol expects.
///
/// Cryptographic checks are delegated to the [`ProofAdapter`]; this type only
/// holds the field-level rules that make a proof match a pledge or a claim.
pub struct RelayStateVerifier {
    network_url: String,
    namespace: String,
    precision: u32,
    pledges: Arc<dyn PledgeVault>,
    adapter: Arc<dyn ProofAdapter>,
}

impl RelayStateVerifier {
    pub fn new(
        network_url: &str,
        namespace: &str,
        precision: u32,
        pledges: Arc<dyn PledgeVault>,
        adapter: Arc<dyn ProofAdapter>,
    ) -> Self {
        RelayStateVerifier {
            network_url: network_url.to_string(),
            namespace: namespace.to_string(),
            precision,
            pledges,
            adapter,
        }
    }

    /// The one pledge recorded locally for a token
    fn retrieve_pledge(&self, token_id: &TokenId) -> Result<PledgeInfo> {
        let mut pledges = self.pledges.pledge_by_token_id(token_id)?;
        match pledges.len() {
            0 => Err(InteropError::NotFound(format!("no pledge recorded for token {}", token_id))),
            1 => Ok(pledges.remove(0)),
            n => Err(InteropError::InvalidProof(format!(
                "{} pledges recorded for token {}, expected exactly one",
                n, token_id
            ))),
        }
    }

    /// The proven token; a pledged token missing from a valid proof has been
    /// spent by a claim redemption or a reclaim
    fn read_token(&self, proof: &dyn LedgerProof, token_id: &TokenId) -> Result<Token> {
        let raw = proof
            .read_state(&self.namespace, &existence_key(token_id))?
            .ok_or_else(|| {
                InteropError::AlreadyClaimedOrReclaimed(format!(
                    "token {} is no longer unspent on [{}]",
                    token_id, self.network_url
                ))
            })?;
        Token::from_json(&raw).map_err(|e| InteropError::InvalidProof(format!("malformed proven token: {}", e)))
    }
}

fn check_token_id(expected: &TokenId, found: &TokenId) -> Result<()> {
    if expected != found {
        return Err(InteropError::mismatch(MismatchField::TokenId, expected, found));
    }
    Ok(())
}

fn check_origin(expected: &str, found: &str) -> Result<()> {
    if expected != found {
        return Err(InteropError::mismatch(MismatchField::Origin, expected, found));
    }
    Ok(())
}

fn unexpected_query(expected: &str, found: &ProofQuery) -> InteropError {
    InteropError::InvalidProof(format!("expected a proof of {}, got {:?}", expected, found))
}

impl StateVerifier for RelayStateVerifier {
    fn verify_proof_existence(&self, raw: &[u8], token_id: &TokenId, metadata: Option<&[u8]>) -> Result<()> {
        let proof = self.adapter.decode(raw)?;
        match proof.query() {
            ProofQuery::Existence { token_id: proven } => check_token_id(token_id, proven)?,
            other => return Err(unexpected_query("existence", other)),
        }
        proof.verify()?;

        let pledge = self.retrieve_pledge(token_id)?;
        let token = self.read_token(proof.as_ref(), token_id)?;

        if token.token_type != pledge.token_type {
            return Err(InteropError::mismatch(
                MismatchField::TokenType,
                &pledge.token_type,
                &token.token_type,
            ));
        }

        // Compare values, not encodings
        let proven_quantity = token
            .quantity(self.precision)
            .map_err(|e| InteropError::InvalidProof(format!("malformed proven quantity: {}", e)))?;
        let expected_quantity = Quantity::from_u64(pledge.amount, self.precision)?;
        if proven_quantity.compare(&expected_quantity)? != Ordering::Equal {
            return Err(InteropError::mismatch(
                MismatchField::Quantity,
                expected_quantity,
                proven_quantity,
            ));
        }

        let owner = token
            .owner()
            .map_err(|e| InteropError::InvalidProof(format!("malformed proven owner: {}", e)))?;
        let script = match owner {
            Some(Owner::Pledge(script)) => script,
            Some(other) => return Err(InteropError::mismatch(MismatchField::Owner, "pledge", other.type_tag())),
            None => return Err(InteropError::mismatch(MismatchField::Owner, "pledge", "burned")),
        };
        if script.recipient != pledge.script.recipient {
            return Err(InteropError::mismatch(
                MismatchField::Recipient,
                &pledge.script.recipient,
                &script.recipient,
            ));
        }
        if script.deadline != pledge.script.deadline {
            return Err(InteropError::mismatch(
                MismatchField::Deadline,
                pledge.script.deadline,
                script.deadline,
            ));
        }
        if script.destination_network != pledge.script.destination_network {
            return Err(InteropError::mismatch(
                MismatchField::DestinationNetwork,
                &pledge.script.destination_network,
                &script.destination_network,
            ));
        }
        if let Some(expected_id) = metadata {
            if expected_id != script.id.as_str().as_bytes() {
                return Err(InteropError::mismatch(
                    MismatchField::PledgeId,
                    String::from_utf8_lossy(expected_id),
                    &script.id,
                ));
            }
        }

        debug!("existence of pledged token {} on [{}] verified", token_id, self.network_url);
        Ok(())
    }

    fn verify_proof_non_existence(
        &self,
        raw: &[u8],
        token_id: &TokenId,
        origin: &str,
        deadline: DateTime<Utc>,
    ) -> Result<()> {
        let proof = self.adapter.decode(raw)?;

        // Cheap field checks first
        match proof.query() {
            ProofQuery::NonExistence {
                token_id: proven_id,
                origin: proven_origin,
                deadline: proven_deadline,
            } => {
                if *proven_deadline != deadline {
                    return Err(InteropError::mismatch(MismatchField::Deadline, deadline, proven_deadline));
                }
                check_token_id(token_id, proven_id)?;
                check_origin(origin, proven_origin)?;
            }
            other => return Err(unexpected_query("non-existence", other)),
        }

        proof.verify()?;

        // The absence must be observed at or after the deadline
        if proof.evaluated_at() < deadline {
            return Err(InteropError::mismatch(
                MismatchField::Deadline,
                format!("evaluation at or after {}", deadline),
                proof.evaluated_at(),
            ));
        }
        if proof.read_state(&self.namespace, &metadata_key(token_id, origin))?.is_some() {
            return Err(InteropError::AlreadyClaimedOrReclaimed(format!(
                "token {} from [{}] was claimed on [{}]",
                token_id, origin, self.network_url
            )));
        }

        debug!("non-existence of a claim of {} on [{}] verified", token_id, self.network_url);
        Ok(())
    }

    fn verify_proof_token_with_metadata_existence(&self, raw: &[u8], token_id: &TokenId, origin: &str) -> Result<()> {
        let proof = self.adapter.decode(raw)?;
        match proof.query() {
            ProofQuery::MetadataExistence {
                token_id: proven_id,
                origin: proven_origin,
            } => {
                check_token_id(token_id, proven_id)?;
                check_origin(origin, proven_origin)?;
            }
            other => return Err(unexpected_query("existence with metadata", other)),
        }

        proof.verify()?;

        let raw_linkage = proof
            .read_state(&self.namespace, &metadata_key(token_id, origin))?
            .ok_or_else(|| {
                InteropError::InvalidProof(format!(
                    "no claim of token {} from [{}] on [{}]",
                    token_id, origin, self.network_url
                ))
            })?;
        let linkage = ClaimLinkage::from_json(&raw_linkage)
            .map_err(|e| InteropError::InvalidProof(format!("malformed claim metadata: {}", e)))?;
        check_token_id(token_id, &linkage.origin_token_id)?;
        check_origin(origin, &linkage.origin_network)?;

        debug!("claim of {} on [{}] verified", token_id, self.network_url);
        Ok(())
    }
}
