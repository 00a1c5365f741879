//! Rules shared by every token scheme: receivers and audit info, script unlock
//! conditions, and the interop keys a committed request writes.

use interop_core::action::{
    AuditInfo, ClaimLinkage, ScriptAuditInfo, TokenRequest, HTLC_PREIMAGE_ATTRIBUTE,
};
use interop_core::driver::{AuditInfoProvider, LedgerReader, PublicParameters, StateUpdate};
use interop_core::error::{InteropError, Result};
use interop_core::id::{Identity, TokenId};
use interop_core::quantity::Quantity;
use interop_core::token::{Owner, Token};
use interop_proofs::keys::{existence_key, metadata_key, outcome_key};
use interop_proofs::PledgeOutcome;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

pub(crate) fn rejected(reason: impl Into<String>) -> InteropError {
    InteropError::LedgerRejected(reason.into())
}

/// The identity spending an input with this owner
pub fn sender_of(owner: &Owner) -> &Identity {
    match owner {
        Owner::Identity(id) => id,
        Owner::Htlc(script) => &script.sender,
        Owner::Pledge(script) => &script.sender,
    }
}

/// Audit info for an owner: plain identities disclose their own info, scripts
/// disclose both sides, burns disclose nothing
pub fn audit_info_of(owner: Option<&Owner>, audit: &dyn AuditInfoProvider) -> Result<Vec<u8>> {
    match owner {
        None => Ok(Vec::new()),
        Some(Owner::Identity(id)) => audit.audit_info(id),
        Some(Owner::Htlc(script)) => ScriptAuditInfo {
            sender: audit.audit_info(&script.sender)?,
            recipient: audit.audit_info(&script.recipient)?,
        }
        .to_bytes(),
        Some(Owner::Pledge(script)) => ScriptAuditInfo {
            sender: audit.audit_info(&script.sender)?,
            recipient: audit.audit_info(&script.issuer)?,
        }
        .to_bytes(),
    }
}

fn check_identity_info(expected: &Identity, info: &[u8]) -> Result<()> {
    let info = AuditInfo::from_bytes(info)
        .map_err(|e| InteropError::AuditMismatch(format!("malformed audit info: {}", e)))?;
    if &info.identity != expected {
        return Err(InteropError::AuditMismatch(format!(
            "audit info of {} does not match owner {}",
            info.identity, expected
        )));
    }
    Ok(())
}

/// Check that disclosed audit info belongs to the owner
pub fn check_audit_info(owner: Option<&Owner>, info: &[u8]) -> Result<()> {
    let (sender, recipient) = match owner {
        None if info.is_empty() => return Ok(()),
        None => return Err(InteropError::AuditMismatch("burn output carries audit info".to_string())),
        Some(Owner::Identity(id)) => return check_identity_info(id, info),
        Some(Owner::Htlc(script)) => (&script.sender, &script.recipient),
        Some(Owner::Pledge(script)) => (&script.sender, &script.issuer),
    };
    let info = ScriptAuditInfo::from_bytes(info)
        .map_err(|e| InteropError::AuditMismatch(format!("malformed script audit info: {}", e)))?;
    check_identity_info(sender, &info.sender)?;
    check_identity_info(recipient, &info.recipient)
}

/// The issuer must be allowed by the public parameters and must sign the request
pub fn check_issuer(pp: &dyn PublicParameters, issuer: &Identity, request: &TokenRequest) -> Result<()> {
    if !pp.issuers().is_empty() && !pp.issuers().contains(issuer) {
        return Err(rejected(format!("{} is not an authorized issuer", issuer)));
    }
    if !request.is_signed_by(issuer) {
        return Err(rejected(format!("issue not signed by issuer {}", issuer)));
    }
    Ok(())
}

/// When auditors are configured, one of them must have inspected the request
pub fn check_auditor(pp: &dyn PublicParameters, request: &TokenRequest) -> Result<()> {
    if pp.auditors().is_empty() {
        return Ok(());
    }
    match &request.auditor {
        Some(auditor) if pp.auditors().contains(auditor) && request.is_signed_by(auditor) => Ok(()),
        Some(auditor) => Err(rejected(format!("{} is not an endorsing auditor", auditor))),
        None => Err(rejected("request was not audited")),
    }
}

/// Take an input out of the unspent set, once per request
pub fn load_input(ledger: &dyn LedgerReader, id: &TokenId, seen: &mut BTreeSet<TokenId>) -> Result<Vec<u8>> {
    if !seen.insert(id.clone()) {
        return Err(InteropError::Conflict(format!("token {} spent twice in one request", id)));
    }
    ledger
        .unspent_output(id)?
        .ok_or_else(|| InteropError::Conflict(format!("token {} is not unspent", id)))
}

/// Check that the request may spend an input with this owner.
///
/// Returns how the pledge was released when the input is a pledged token.
///
/// # Parameters
/// * `ledger` - Gives the ledger time used for deadlines
/// * `request` - The request, carrying its signers
/// * `input` - Owner of the spent input
/// * `outputs` - Owners of the outputs of the same action, `None` for burns
/// * `attributes` - Public attributes of the action
pub fn check_unlock(
    ledger: &dyn LedgerReader,
    request: &TokenRequest,
    input: &Owner,
    outputs: &[Option<Owner>],
    attributes: &BTreeMap<String, Vec<u8>>,
) -> Result<Option<PledgeOutcome>> {
    let now = ledger.now();
    match input {
        Owner::Identity(id) => {
            if !request.is_signed_by(id) {
                return Err(rejected(format!("input not signed by its owner {}", id)));
            }
            Ok(None)
        }
        Owner::Htlc(script) => {
            if now < script.deadline {
                let preimage = attributes
                    .get(HTLC_PREIMAGE_ATTRIBUTE)
                    .ok_or_else(|| rejected("htlc claimed without preimage"))?;
                if !script.matches_preimage(preimage) {
                    return Err(rejected("htlc preimage does not match the hash lock"));
                }
                if !request.is_signed_by(&script.recipient) {
                    return Err(rejected("htlc claim not signed by the recipient"));
                }
            } else if !request.is_signed_by(&script.sender) {
                return Err(rejected("expired htlc not signed by the sender"));
            }
            Ok(None)
        }
        Owner::Pledge(script) => {
            if request.is_signed_by(&script.issuer) && outputs.iter().all(Option::is_none) {
                return Ok(Some(PledgeOutcome::Redeemed));
            }
            if !request.is_signed_by(&script.sender) {
                return Err(rejected("pledged token spent by neither its issuer nor its sender"));
            }
            if now < script.deadline {
                return Err(rejected(format!("pledge deadline {} not reached", script.deadline)));
            }
            let returned = outputs
                .iter()
                .all(|o| matches!(o, Some(Owner::Identity(id)) if id == &script.sender));
            if !returned {
                return Err(rejected("reclaimed pledge must return to its sender"));
            }
            Ok(Some(PledgeOutcome::Reclaimed))
        }
    }
}

/// Record the linkage of a claim issue; a claim is accepted once, before the deadline
pub fn record_claim(ledger: &dyn LedgerReader, linkage: &ClaimLinkage, update: &mut StateUpdate) -> Result<()> {
    if ledger.now() >= linkage.deadline {
        return Err(rejected(format!(
            "claim of {} after the pledge deadline {}",
            linkage.origin_token_id, linkage.deadline
        )));
    }
    let key = metadata_key(&linkage.origin_token_id, &linkage.origin_network);
    if ledger.get_state(&key)?.is_some() || update.writes.contains_key(&key) {
        return Err(InteropError::Conflict(format!(
            "token {} from [{}] already claimed",
            linkage.origin_token_id, linkage.origin_network
        )));
    }
    debug!("recording claim of {}", linkage.origin_token_id);
    update.put(key, linkage.to_json()?);
    Ok(())
}

/// Record a created output and, for pledges, its plaintext disclosure
pub fn record_output(update: &mut StateUpdate, id: TokenId, raw: Vec<u8>, disclosed: Option<&Token>) -> Result<()> {
    if let Some(token) = disclosed {
        if let Some(Owner::Pledge(_)) = token.owner()? {
            update.put(existence_key(&id), token.to_json()?);
        }
    }
    update.created.push((id, raw));
    Ok(())
}

/// Record a spent input and how a pledge was released
pub fn record_spend(update: &mut StateUpdate, id: TokenId, outcome: Option<PledgeOutcome>) {
    if let Some(outcome) = outcome {
        update.delete(existence_key(&id));
        update.put(outcome_key(&id), outcome.as_bytes().to_vec());
    }
    update.spent.push(id);
}

/// Add `quantity` to the running total of its type
pub fn accumulate(sums: &mut BTreeMap<String, Quantity>, token_type: &str, quantity: &Quantity) -> Result<()> {
    let total = match sums.get(token_type) {
        Some(total) => total.checked_add(quantity)?,
        None => *quantity,
    };
    sums.insert(token_type.to_string(), total);
    Ok(())
}

/// True when both sides carry the same value for every type
pub fn balanced(inputs: &BTreeMap<String, Quantity>, outputs: &BTreeMap<String, Quantity>) -> bool {
    inputs.len() == outputs.len()
        && inputs.iter().all(|(token_type, total)| {
            outputs
                .get(token_type)
                .and_then(|other| total.compare(other).ok())
                .map_or(false, |ordering| ordering.is_eq())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use interop_core::id::{PledgeId, TxId};
    use interop_core::token::PledgeScript;

    struct FixedLedger {
        now: DateTime<Utc>,
        state: BTreeMap<String, Vec<u8>>,
    }

    impl LedgerReader for FixedLedger {
        fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.state.get(key).cloned())
        }

        fn unspent_output(&self, _id: &TokenId) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }

        fn now(&self) -> DateTime<Utc> {
            self.now
        }
    }

    fn pledge_owner(deadline: DateTime<Utc>) -> (Owner, PledgeScript) {
        let script = PledgeScript {
            sender: Identity::from_label("alice"),
            recipient: Identity::from_label("bob"),
            issuer: Identity::from_label("issuer"),
            id: PledgeId::new("p"),
            deadline,
            destination_network: "fabric://beta.ch.ns/".to_string(),
        };
        (Owner::Pledge(script.clone()), script)
    }

    fn signed_by(identities: &[&Identity]) -> TokenRequest {
        let mut request = TokenRequest::new(TxId::new("tx"));
        for id in identities {
            request.add_signer(id);
        }
        request
    }

    #[test]
    fn test_pledge_unlock_rules() {
        let now = Utc::now();
        let ledger = FixedLedger {
            now,
            state: BTreeMap::new(),
        };
        let attributes = BTreeMap::new();

        // Redeem by the issuer
        let (owner, script) = pledge_owner(now + Duration::minutes(1));
        let request = signed_by(&[&script.issuer]);
        assert_eq!(
            check_unlock(&ledger, &request, &owner, &[None], &attributes).unwrap(),
            Some(PledgeOutcome::Redeemed)
        );
        let to_issuer = Some(Owner::Identity(script.issuer.clone()));
        assert!(check_unlock(&ledger, &request, &owner, &[to_issuer], &attributes).is_err());

        // Reclaim before and after the deadline
        let back = Some(Owner::Identity(script.sender.clone()));
        let request = signed_by(&[&script.sender]);
        assert!(check_unlock(&ledger, &request, &owner, &[back.clone()], &attributes).is_err());

        let (expired, _) = pledge_owner(now - Duration::seconds(1));
        assert_eq!(
            check_unlock(&ledger, &request, &expired, &[back], &attributes).unwrap(),
            Some(PledgeOutcome::Reclaimed)
        );
        let elsewhere = Some(Owner::Identity(script.recipient.clone()));
        assert!(check_unlock(&ledger, &request, &expired, &[elsewhere], &attributes).is_err());

        // Nobody else
        let request = signed_by(&[&script.recipient]);
        assert!(check_unlock(&ledger, &request, &expired, &[None], &attributes).is_err());
    }

    #[test]
    fn test_claim_recorded_once_before_deadline() {
        let now = Utc::now();
        let linkage = ClaimLinkage {
            origin_token_id: TokenId::new(TxId::new("tx"), 0),
            origin_network: "fabric://alpha.ch.ns/".to_string(),
            deadline: now + Duration::minutes(1),
        };
        let mut ledger = FixedLedger {
            now,
            state: BTreeMap::new(),
        };

        let mut update = StateUpdate::default();
        record_claim(&ledger, &linkage, &mut update).unwrap();
        assert!(matches!(
            record_claim(&ledger, &linkage, &mut update),
            Err(InteropError::Conflict(_))
        ));

        ledger.state = update
            .writes
            .iter()
            .filter_map(|(k, v)| v.clone().map(|v| (k.clone(), v)))
            .collect();
        assert!(matches!(
            record_claim(&ledger, &linkage, &mut StateUpdate::default()),
            Err(InteropError::Conflict(_))
        ));

        ledger.state.clear();
        ledger.now = linkage.deadline;
        assert!(matches!(
            record_claim(&ledger, &linkage, &mut StateUpdate::default()),
            Err(InteropError::LedgerRejected(_))
        ));
    }

    #[test]
    fn test_audit_info_checks() {
        let (owner, script) = pledge_owner(Utc::now());
        let info = |id: &Identity| {
            AuditInfo {
                identity: id.clone(),
                enrollment_id: "e".to_string(),
            }
            .to_bytes()
            .unwrap()
        };
        let good = ScriptAuditInfo {
            sender: info(&script.sender),
            recipient: info(&script.issuer),
        }
        .to_bytes()
        .unwrap();
        check_audit_info(Some(&owner), &good).unwrap();

        let wrong = ScriptAuditInfo {
            sender: info(&script.sender),
            recipient: info(&script.recipient),
        }
        .to_bytes()
        .unwrap();
        assert!(matches!(
            check_audit_info(Some(&owner), &wrong),
            Err(InteropError::AuditMismatch(_))
        ));
        check_audit_info(None, &[]).unwrap();
    }

    #[test]
    fn test_balanced() {
        let q = |v| Quantity::from_u64(v, 64).unwrap();
        let mut inputs = BTreeMap::new();
        let mut outputs = BTreeMap::new();
        accumulate(&mut inputs, "USD", &q(30)).unwrap();
        accumulate(&mut inputs, "USD", &q(20)).unwrap();
        accumulate(&mut outputs, "USD", &q(50)).unwrap();
        assert!(balanced(&inputs, &outputs));

        accumulate(&mut outputs, "EUR", &q(1)).unwrap();
        assert!(!balanced(&inputs, &outputs));
    }
}
