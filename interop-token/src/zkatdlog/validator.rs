use super::actions::{balance_context, CommittedOutput, ZkIssueAction, ZkTransferAction};
use super::params::ZkatdlogPublicParams;
use super::pedersen::{sum_commitments, Generators, Opening};
use super::range::{range_context, RangeProver};
use crate::common::{
    check_auditor, check_issuer, check_unlock, load_input, record_claim, record_output, record_spend, rejected,
};
use interop_core::action::TokenRequest;
use interop_core::driver::{LedgerReader, StateUpdate, Validator};
use interop_core::error::Result;
use interop_core::id::TokenId;
use interop_core::token::{Owner, Token};
use interop_proofs::schnorr::{self, decode_point};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Validates committed requests: homomorphic balance per type, script
/// unlock rules and pledge disclosures
pub struct ZkatdlogValidator {
    pp: Arc<ZkatdlogPublicParams>,
    generators: Generators,
    ranges: Arc<dyn RangeProver>,
}

struct RequestCursor {
    next_index: u32,
    spent: BTreeSet<TokenId>,
}

impl ZkatdlogValidator {
    pub fn new(pp: Arc<ZkatdlogPublicParams>, ranges: Arc<dyn RangeProver>) -> Result<Self> {
        let generators = pp.generators()?;
        Ok(ZkatdlogValidator {
            pp,
            generators,
            ranges,
        })
    }

    fn output_owners(&self, outputs: &[CommittedOutput]) -> Result<Vec<Option<Owner>>> {
        outputs
            .iter()
            .map(|o| {
                if o.token_type.is_empty() {
                    return Err(rejected("output without a token type"));
                }
                o.owner().map_err(|e| rejected(format!("invalid output owner: {}", e)))
            })
            .collect()
    }

    /// Every committed value must lie below `2^precision`, otherwise a
    /// negative output could balance an inflated one
    fn check_ranges(&self, outputs: &[CommittedOutput], proofs: &[Vec<u8>]) -> Result<()> {
        if proofs.len() != outputs.len() {
            return Err(rejected("one range proof per output expected"));
        }
        for (i, (output, proof)) in outputs.iter().zip(proofs).enumerate() {
            let commitment = decode_point(&output.commitment)
                .ok_or_else(|| rejected(format!("output {} has no valid commitment", i)))?;
            if !self.ranges.verify(
                &self.generators,
                &commitment,
                proof,
                self.pp.precision,
                &range_context(&output.commitment),
            ) {
                return Err(rejected(format!("output {} is out of range", i)));
            }
        }
        Ok(())
    }

    /// Pledged outputs must be disclosed; the disclosure is what remote
    /// networks prove the existence of
    fn disclosed_token(&self, output: &CommittedOutput, disclosure: Option<&Opening>) -> Result<Option<Token>> {
        if !matches!(output.owner()?, Some(Owner::Pledge(_))) {
            return Ok(None);
        }
        let opening = disclosure.ok_or_else(|| rejected("pledged output without disclosure"))?;
        output
            .open(opening, &self.generators, self.pp.precision)
            .map(Some)
            .map_err(|e| rejected(format!("invalid pledge disclosure: {}", e)))
    }

    fn record_outputs(
        &self,
        request: &TokenRequest,
        outputs: &[CommittedOutput],
        disclosures: &[Option<Opening>],
        cursor: &mut RequestCursor,
        update: &mut StateUpdate,
    ) -> Result<()> {
        if disclosures.len() != outputs.len() {
            return Err(rejected("one disclosure slot per output expected"));
        }
        for (output, disclosure) in outputs.iter().zip(disclosures) {
            let token = self.disclosed_token(output, disclosure.as_ref())?;
            let id = TokenId::new(request.anchor.clone(), cursor.next_index);
            cursor.next_index += 1;
            record_output(update, id, output.to_bytes()?, token.as_ref())?;
        }
        Ok(())
    }

    fn verify_issue(
        &self,
        ledger: &dyn LedgerReader,
        request: &TokenRequest,
        action: &ZkIssueAction,
        cursor: &mut RequestCursor,
        update: &mut StateUpdate,
    ) -> Result<()> {
        check_issuer(self.pp.as_ref(), &action.issuer, request)?;
        if action.outputs.is_empty() {
            return Err(rejected("issue without outputs"));
        }
        if self.output_owners(&action.outputs)?.iter().any(Option::is_none) {
            return Err(rejected("issue of a burned token"));
        }
        self.check_ranges(&action.outputs, &action.range_proofs)?;
        if let Some(linkage) = &action.linkage {
            record_claim(ledger, linkage, update)?;
        }
        self.record_outputs(request, &action.outputs, &action.disclosures, cursor, update)
    }

    fn verify_transfer(
        &self,
        ledger: &dyn LedgerReader,
        request: &TokenRequest,
        action: &ZkTransferAction,
        cursor: &mut RequestCursor,
        update: &mut StateUpdate,
    ) -> Result<()> {
        if action.inputs.is_empty() || action.outputs.is_empty() {
            return Err(rejected("transfer needs inputs and outputs"));
        }
        let output_owners = self.output_owners(&action.outputs)?;
        self.check_ranges(&action.outputs, &action.range_proofs)?;

        let mut inputs: BTreeMap<&str, Vec<[u8; 32]>> = BTreeMap::new();
        let mut loaded = Vec::with_capacity(action.inputs.len());
        for id in &action.inputs {
            loaded.push((id, CommittedOutput::from_bytes(&load_input(ledger, id, &mut cursor.spent)?)?));
        }
        for (id, input) in &loaded {
            let owner = input
                .owner()?
                .ok_or_else(|| rejected(format!("token {} is burned", id)))?;
            let outcome = check_unlock(ledger, request, &owner, &output_owners, &action.attributes)?;
            inputs.entry(&input.token_type).or_default().push(input.commitment);
            record_spend(update, (*id).clone(), outcome);
        }

        let mut outputs: BTreeMap<&str, Vec<[u8; 32]>> = BTreeMap::new();
        for output in &action.outputs {
            outputs.entry(&output.token_type).or_default().push(output.commitment);
        }

        let proven: BTreeSet<&str> = action.balance_proofs.keys().map(String::as_str).collect();
        if !inputs.keys().copied().eq(outputs.keys().copied()) || !inputs.keys().copied().eq(proven.iter().copied())
        {
            return Err(rejected("input, output and proven token types differ"));
        }
        for (token_type, proof) in &action.balance_proofs {
            // Σ C_in - Σ C_out = ρ·H exactly when the values balance
            let difference = sum_commitments(&inputs[token_type.as_str()])?
                - sum_commitments(&outputs[token_type.as_str()])?;
            let context = balance_context(&request.anchor, token_type);
            if !schnorr::verify(&self.generators.h, &difference, proof, &context) {
                return Err(rejected(format!("transfer does not conserve [{}]", token_type)));
            }
        }

        self.record_outputs(request, &action.outputs, &action.disclosures, cursor, update)
    }
}

impl Validator for ZkatdlogValidator {
    fn verify_token_request(&self, ledger: &dyn LedgerReader, request: &TokenRequest) -> Result<StateUpdate> {
        if request.anchor.is_empty() {
            return Err(rejected("request without anchor"));
        }
        check_auditor(self.pp.as_ref(), request)?;

        let mut update = StateUpdate::default();
        let mut cursor = RequestCursor {
            next_index: 0,
            spent: BTreeSet::new(),
        };
        for raw in &request.issues {
            let action = ZkIssueAction::from_bytes(raw)?;
            self.verify_issue(ledger, request, &action, &mut cursor, &mut update)?;
        }
        for raw in &request.transfers {
            let action = ZkTransferAction::from_bytes(raw)?;
            self.verify_transfer(ledger, request, &action, &mut cursor, &mut update)?;
        }

        debug!(
            "committed request {} valid: {} spent, {} created",
            request.anchor,
            update.spent.len(),
            update.created.len()
        );
        Ok(update)
    }
}
