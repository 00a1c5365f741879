use super::actions::{balance_context, CommittedOutput, ZkIssueAction, ZkTransferAction};
use super::params::ZkatdlogPublicParams;
use super::pedersen::{Generators, Opening};
use super::range::{range_context, RangeProver};
use crate::common::{audit_info_of, sender_of};
use curve25519_dalek::scalar::Scalar;
use interop_core::action::{
    IssueMetadata, IssueOptions, TokenRequest, TokenRequestMetadata, TransferMetadata, TransferOptions,
};
use interop_core::driver::{AuditInfoProvider, PublicParameters, TokenLoader, TokenService};
use interop_core::error::{InteropError, Result};
use interop_core::id::{Identity, TokenId, TxId};
use interop_core::quantity::Quantity;
use interop_core::token::{Owner, Token};
use interop_proofs::schnorr;
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A spendable input with the opening of its commitment
struct OpenedInput {
    output: CommittedOutput,
    opening: Opening,
}

/// Builds committed actions and runs the auditor check
pub struct ZkatdlogService {
    pp: Arc<ZkatdlogPublicParams>,
    generators: Generators,
    loader: Arc<dyn TokenLoader>,
    ranges: Arc<dyn RangeProver>,
}

impl ZkatdlogService {
    pub fn new(
        pp: Arc<ZkatdlogPublicParams>,
        loader: Arc<dyn TokenLoader>,
        ranges: Arc<dyn RangeProver>,
    ) -> Result<Self> {
        let generators = pp.generators()?;
        Ok(ZkatdlogService {
            pp,
            generators,
            loader,
            ranges,
        })
    }

    /// The opening of a fresh output of `value`, with its commitment and range proof
    fn commit_output(
        &self,
        owner: Option<&Owner>,
        token_type: &str,
        value: u64,
    ) -> Result<(CommittedOutput, Opening, Vec<u8>)> {
        // Reject values the precision cannot hold
        Quantity::from_u64(value, self.pp.precision)?;
        let opening = Opening::random(value);
        let commitment = opening.commit(&self.generators)?;
        let range = self.ranges.prove(
            &self.generators,
            value,
            &opening.blinding()?,
            self.pp.precision,
            &range_context(&commitment),
        )?;
        let output = CommittedOutput {
            owner: owner.map(Owner::to_raw).transpose()?.unwrap_or_default(),
            token_type: token_type.to_string(),
            commitment,
        };
        Ok((output, opening, range))
    }

    fn open_inputs(&self, ids: &[TokenId], openings: Option<&[Vec<u8>]>) -> Result<Vec<OpenedInput>> {
        let loaded = self.loader.load_tokens(ids)?;
        if loaded.len() != ids.len() {
            return Err(InteropError::NotFound(format!("loaded {} of {} inputs", loaded.len(), ids.len())));
        }
        loaded
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let output = CommittedOutput::from_bytes(&t.output)?;
                let raw_opening = match openings {
                    Some(openings) => openings
                        .get(i)
                        .ok_or_else(|| InteropError::InvalidRequest("missing input opening".to_string()))?,
                    None => &t.output_metadata,
                };
                let opening = Opening::from_bytes(raw_opening)?;
                output.open(&opening, &self.generators, self.pp.precision)?;
                Ok(OpenedInput { output, opening })
            })
            .collect()
    }

    /// Open outputs with their metadata, returning per-type value totals
    fn open_outputs(
        &self,
        outputs: &[CommittedOutput],
        openings: &[Vec<u8>],
        infos: &[Vec<u8>],
    ) -> Result<BTreeMap<String, u128>> {
        if outputs.len() != openings.len() || outputs.len() != infos.len() {
            return Err(InteropError::AuditMismatch("output count differs from metadata".to_string()));
        }
        let mut totals = BTreeMap::new();
        for ((output, raw_opening), info) in outputs.iter().zip(openings).zip(infos) {
            let opening = Opening::from_bytes(raw_opening)?;
            output.open(&opening, &self.generators, self.pp.precision)?;
            crate::common::check_audit_info(output.owner()?.as_ref(), info)?;
            *totals.entry(output.token_type.clone()).or_insert(0u128) += opening.value as u128;
        }
        Ok(totals)
    }

    fn audit_issue(&self, raw: &[u8], metadata: &IssueMetadata) -> Result<()> {
        let action = ZkIssueAction::from_bytes(raw)?;
        if action.issuer != metadata.issuer {
            return Err(InteropError::AuditMismatch("issuer differs from metadata".to_string()));
        }
        self.check_disclosed_outputs(&action.outputs, &metadata.outputs)?;
        self.open_outputs(&action.outputs, &metadata.outputs_metadata, &metadata.receiver_audit_infos)?;
        Ok(())
    }

    fn audit_transfer(&self, raw: &[u8], metadata: &TransferMetadata) -> Result<()> {
        let action = ZkTransferAction::from_bytes(raw)?;
        if action.inputs != metadata.token_ids || metadata.sender_audit_infos.len() != action.inputs.len() {
            return Err(InteropError::AuditMismatch("inputs differ from metadata".to_string()));
        }
        self.check_disclosed_outputs(&action.outputs, &metadata.outputs)?;

        // Input commitments come from the ledger, openings from the metadata
        let inputs = self.open_inputs(&action.inputs, Some(metadata.inputs_metadata.as_slice()))?;
        let mut input_totals = BTreeMap::new();
        for (input, info) in inputs.iter().zip(&metadata.sender_audit_infos) {
            crate::common::check_audit_info(input.output.owner()?.as_ref(), info)?;
            *input_totals.entry(input.output.token_type.clone()).or_insert(0u128) += input.opening.value as u128;
        }

        let output_totals =
            self.open_outputs(&action.outputs, &metadata.outputs_metadata, &metadata.receiver_audit_infos)?;
        if input_totals != output_totals {
            return Err(InteropError::AuditMismatch("transfer does not conserve value".to_string()));
        }
        Ok(())
    }

    fn check_disclosed_outputs(&self, outputs: &[CommittedOutput], disclosed: &[Vec<u8>]) -> Result<()> {
        if outputs.len() != disclosed.len() {
            return Err(InteropError::AuditMismatch("output count differs from metadata".to_string()));
        }
        for (output, raw) in outputs.iter().zip(disclosed) {
            if &output.to_bytes()? != raw {
                return Err(InteropError::AuditMismatch("output differs from metadata".to_string()));
            }
        }
        Ok(())
    }
}

fn disclosure(owner: Option<&Owner>, opening: &Opening) -> Option<Opening> {
    match owner {
        Some(Owner::Pledge(_)) => Some(*opening),
        _ => None,
    }
}

impl TokenService for ZkatdlogService {
    fn public_parameters(&self) -> Arc<dyn PublicParameters> {
        self.pp.clone()
    }

    fn issue(
        &self,
        issuer: &Identity,
        token_type: &str,
        values: &[u64],
        owners: &[Owner],
        opts: &IssueOptions,
        audit: &dyn AuditInfoProvider,
    ) -> Result<(Vec<u8>, IssueMetadata)> {
        if values.is_empty() || values.len() != owners.len() {
            return Err(InteropError::InvalidRequest(format!(
                "{} values for {} owners",
                values.len(),
                owners.len()
            )));
        }
        if !self.pp.issuers.is_empty() && !self.pp.issuers.contains(issuer) {
            return Err(InteropError::InvalidRequest(format!("{} is not an authorized issuer", issuer)));
        }

        let mut metadata = IssueMetadata {
            issuer: issuer.clone(),
            ..Default::default()
        };
        let mut outputs = Vec::with_capacity(values.len());
        let mut disclosures = Vec::with_capacity(values.len());
        let mut range_proofs = Vec::with_capacity(values.len());
        for (value, owner) in values.iter().zip(owners) {
            let (output, opening, range) = self.commit_output(Some(owner), token_type, *value)?;
            metadata.outputs.push(output.to_bytes()?);
            metadata.outputs_metadata.push(opening.to_bytes()?);
            metadata.receivers.push(owner.receiver().clone());
            metadata.receiver_audit_infos.push(audit_info_of(Some(owner), audit)?);
            disclosures.push(disclosure(Some(owner), &opening));
            range_proofs.push(range);
            outputs.push(output);
        }

        let action = ZkIssueAction {
            issuer: issuer.clone(),
            outputs,
            disclosures,
            range_proofs,
            linkage: opts.linkage.clone(),
            proof: opts.proof.clone(),
        };
        debug!("built committed issue of {} [{}] outputs", values.len(), token_type);
        Ok((action.to_bytes()?, metadata))
    }

    fn transfer(
        &self,
        tx_id: &TxId,
        inputs: &[TokenId],
        outputs: &[Token],
        opts: &TransferOptions,
        audit: &dyn AuditInfoProvider,
    ) -> Result<(Vec<u8>, TransferMetadata)> {
        if inputs.is_empty() || outputs.is_empty() {
            return Err(InteropError::InvalidRequest("transfer needs inputs and outputs".to_string()));
        }
        let opened = self.open_inputs(inputs, None)?;

        let mut metadata = TransferMetadata {
            token_ids: inputs.to_vec(),
            ..Default::default()
        };
        // Per type: value in, value out, blinding in minus blinding out
        let mut balances: BTreeMap<String, (u128, u128, Scalar)> = BTreeMap::new();
        for input in &opened {
            let owner = input
                .output
                .owner()?
                .ok_or_else(|| InteropError::InvalidRequest("cannot spend a burned token".to_string()))?;
            metadata.senders.push(sender_of(&owner).clone());
            metadata.sender_audit_infos.push(audit_info_of(Some(&owner), audit)?);
            metadata.inputs_metadata.push(input.opening.to_bytes()?);

            let entry = balances
                .entry(input.output.token_type.clone())
                .or_insert((0, 0, Scalar::ZERO));
            entry.0 += input.opening.value as u128;
            entry.2 += input.opening.blinding()?;
        }

        let mut committed = Vec::with_capacity(outputs.len());
        let mut disclosures = Vec::with_capacity(outputs.len());
        let mut range_proofs = Vec::with_capacity(outputs.len());
        for token in outputs {
            let owner = token.owner()?;
            let value = token.quantity(self.pp.precision)?.value() as u64;
            let (output, opening, range) = self.commit_output(owner.as_ref(), &token.token_type, value)?;

            let entry = balances
                .get_mut(&token.token_type)
                .ok_or_else(|| InteropError::InvalidRequest(format!("no input of type [{}]", token.token_type)))?;
            entry.1 += value as u128;
            entry.2 -= opening.blinding()?;

            let receiver = owner.as_ref().map(|o| o.receiver().clone()).unwrap_or_default();
            metadata.receiver_is_sender.push(metadata.senders.contains(&receiver));
            metadata.receiver_audit_infos.push(audit_info_of(owner.as_ref(), audit)?);
            metadata.receivers.push(receiver);
            metadata.outputs.push(output.to_bytes()?);
            metadata.outputs_metadata.push(opening.to_bytes()?);
            disclosures.push(disclosure(owner.as_ref(), &opening));
            range_proofs.push(range);
            committed.push(output);
        }

        let mut balance_proofs = BTreeMap::new();
        for (token_type, (value_in, value_out, rho)) in &balances {
            if value_in != value_out {
                return Err(InteropError::InvalidRequest(format!(
                    "transfer {} does not conserve [{}]: {} in, {} out",
                    tx_id, token_type, value_in, value_out
                )));
            }
            let proof = schnorr::prove(&self.generators.h, rho, &balance_context(tx_id, token_type));
            balance_proofs.insert(token_type.clone(), proof);
        }

        let action = ZkTransferAction {
            inputs: inputs.to_vec(),
            outputs: committed,
            disclosures,
            range_proofs,
            balance_proofs,
            attributes: opts.attributes.clone(),
        };
        debug!("built committed transfer {} of {} inputs", tx_id, inputs.len());
        Ok((action.to_bytes()?, metadata))
    }

    fn deobfuscate(&self, output: &[u8], output_metadata: &[u8]) -> Result<Token> {
        let output = CommittedOutput::from_bytes(output)?;
        let opening = Opening::from_bytes(output_metadata)?;
        output.open(&opening, &self.generators, self.pp.precision)
    }

    fn auditor_check(&self, request: &TokenRequest, metadata: &TokenRequestMetadata) -> Result<()> {
        if request.issues.len() != metadata.issues.len() || request.transfers.len() != metadata.transfers.len() {
            return Err(InteropError::AuditMismatch("actions differ from metadata".to_string()));
        }
        let audit = |e: InteropError| match e {
            InteropError::AuditMismatch(_) => e,
            other => InteropError::AuditMismatch(other.to_string()),
        };
        for (raw, meta) in request.issues.iter().zip(&metadata.issues) {
            self.audit_issue(raw, meta).map_err(audit)?;
        }
        for (raw, meta) in request.transfers.iter().zip(&metadata.transfers) {
            self.audit_transfer(raw, meta).map_err(audit)?;
        }
        debug!("audited committed request {}", request.anchor);
        Ok(())
    }
}
