use super::actions::{owners, IssueAction, TransferAction};
use super::params::FabtokenPublicParams;
use crate::common::{accumulate, audit_info_of, balanced, check_audit_info, sender_of};
use interop_core::action::{
    IssueMetadata, IssueOptions, TokenRequest, TokenRequestMetadata, TransferMetadata, TransferOptions,
};
use interop_core::driver::{AuditInfoProvider, PublicParameters, TokenLoader, TokenService};
use interop_core::error::{InteropError, Result};
use interop_core::id::{Identity, TokenId, TxId};
use interop_core::quantity::Quantity;
use interop_core::token::{Owner, Token};
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds and audits plaintext actions
pub struct FabtokenService {
    pp: Arc<FabtokenPublicParams>,
    loader: Arc<dyn TokenLoader>,
}

impl FabtokenService {
    pub fn new(pp: Arc<FabtokenPublicParams>, loader: Arc<dyn TokenLoader>) -> Self {
        FabtokenService { pp, loader }
    }

    fn load_inputs(&self, ids: &[TokenId]) -> Result<Vec<Token>> {
        let loaded = self.loader.load_tokens(ids)?;
        if loaded.len() != ids.len() {
            return Err(InteropError::NotFound(format!(
                "loaded {} of {} inputs",
                loaded.len(),
                ids.len()
            )));
        }
        loaded.iter().map(|t| Token::from_json(&t.output)).collect()
    }

    fn totals(&self, tokens: &[Token]) -> Result<BTreeMap<String, Quantity>> {
        let mut sums = BTreeMap::new();
        for token in tokens {
            accumulate(&mut sums, &token.token_type, &token.quantity(self.pp.precision)?)?;
        }
        Ok(sums)
    }

    fn audit_issue(&self, raw: &[u8], metadata: &IssueMetadata) -> Result<()> {
        let action = IssueAction::from_bytes(raw)?;
        if action.issuer != metadata.issuer {
            return Err(InteropError::AuditMismatch("issuer differs from metadata".to_string()));
        }
        self.audit_outputs(&action.outputs, &metadata.outputs, &metadata.receiver_audit_infos)
    }

    fn audit_transfer(&self, raw: &[u8], metadata: &TransferMetadata) -> Result<()> {
        let action = TransferAction::from_bytes(raw)?;
        if action.inputs != metadata.token_ids {
            return Err(InteropError::AuditMismatch("inputs differ from metadata".to_string()));
        }
        let inputs = self.load_inputs(&action.inputs)?;
        if metadata.sender_audit_infos.len() != inputs.len() {
            return Err(InteropError::AuditMismatch("missing sender audit info".to_string()));
        }
        for (input, info) in inputs.iter().zip(&metadata.sender_audit_infos) {
            check_audit_info(input.owner()?.as_ref(), info)?;
        }
        if !balanced(&self.totals(&inputs)?, &self.totals(&action.outputs)?) {
            return Err(InteropError::AuditMismatch("transfer does not conserve value".to_string()));
        }
        self.audit_outputs(&action.outputs, &metadata.outputs, &metadata.receiver_audit_infos)
    }

    fn audit_outputs(&self, outputs: &[Token], disclosed: &[Vec<u8>], infos: &[Vec<u8>]) -> Result<()> {
        if outputs.len() != disclosed.len() || outputs.len() != infos.len() {
            return Err(InteropError::AuditMismatch("output count differs from metadata".to_string()));
        }
        for ((token, raw), info) in outputs.iter().zip(disclosed).zip(infos) {
            if &token.to_json()? != raw {
                return Err(InteropError::AuditMismatch("output differs from metadata".to_string()));
            }
            check_audit_info(token.owner()?.as_ref(), info)?;
        }
        Ok(())
    }
}

impl TokenService for FabtokenService {
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
        for (value, owner) in values.iter().zip(owners) {
            let token = Token::new(owner, token_type, &Quantity::from_u64(*value, self.pp.precision)?)?;
            let raw = token.to_json()?;
            metadata.outputs.push(raw.clone());
            metadata.outputs_metadata.push(raw);
            metadata.receivers.push(owner.receiver().clone());
            metadata.receiver_audit_infos.push(audit_info_of(Some(owner), audit)?);
            outputs.push(token);
        }

        let action = IssueAction {
            issuer: issuer.clone(),
            outputs,
            linkage: opts.linkage.clone(),
            proof: opts.proof.clone(),
        };
        debug!("built issue of {} [{}] outputs", values.len(), token_type);
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
        let input_tokens = self.load_inputs(inputs)?;
        if !balanced(&self.totals(&input_tokens)?, &self.totals(outputs)?) {
            return Err(InteropError::InvalidRequest(format!(
                "transfer {} does not conserve value",
                tx_id
            )));
        }

        let mut metadata = TransferMetadata {
            token_ids: inputs.to_vec(),
            ..Default::default()
        };
        for token in &input_tokens {
            let owner = token
                .owner()?
                .ok_or_else(|| InteropError::InvalidRequest("cannot spend a burned token".to_string()))?;
            metadata.senders.push(sender_of(&owner).clone());
            metadata.sender_audit_infos.push(audit_info_of(Some(&owner), audit)?);
            metadata.inputs_metadata.push(token.to_json()?);
        }
        for (token, owner) in outputs.iter().zip(owners(outputs)?) {
            let raw = token.to_json()?;
            let receiver = owner.as_ref().map(|o| o.receiver().clone()).unwrap_or_default();
            metadata.receiver_is_sender.push(metadata.senders.contains(&receiver));
            metadata.receiver_audit_infos.push(audit_info_of(owner.as_ref(), audit)?);
            metadata.receivers.push(receiver);
            metadata.outputs.push(raw.clone());
            metadata.outputs_metadata.push(raw);
        }

        let action = TransferAction {
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
            attributes: opts.attributes.clone(),
        };
        debug!("built transfer {} of {} inputs into {} outputs", tx_id, inputs.len(), outputs.len());
        Ok((action.to_bytes()?, metadata))
    }

    fn deobfuscate(&self, output: &[u8], _output_metadata: &[u8]) -> Result<Token> {
        Token::from_json(output)
    }

    fn auditor_check(&self, request: &TokenRequest, metadata: &TokenRequestMetadata) -> Result<()> {
        if request.issues.len() != metadata.issues.len() || request.transfers.len() != metadata.transfers.len() {
            return Err(InteropError::AuditMismatch("actions differ from metadata".to_string()));
        }
        for (raw, meta) in request.issues.iter().zip(&metadata.issues) {
            self.audit_issue(raw, meta)?;
        }
        for (raw, meta) in request.transfers.iter().zip(&metadata.transfers) {
            self.audit_transfer(raw, meta)?;
        }
        debug!("audited request {}", request.anchor);
        Ok(())
    }
}
