use super::actions::{owners, IssueAction, TransferAction};
use super::params::FabtokenPublicParams;
use crate::common::{
    accumulate, balanced, check_auditor, check_issuer, check_unlock, load_input, record_claim, record_output,
    record_spend, rejected,
};
use interop_core::action::TokenRequest;
use interop_core::driver::{LedgerReader, StateUpdate, Validator};
use interop_core::error::Result;
use interop_core::id::TokenId;
use interop_core::token::Token;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Validates plaintext requests against the committed state
pub struct FabtokenValidator {
    pp: Arc<FabtokenPublicParams>,
}

/// Running state of one request: next output index and inputs already spent
struct RequestCursor {
    next_index: u32,
    spent: BTreeSet<TokenId>,
}

impl FabtokenValidator {
    pub fn new(pp: Arc<FabtokenPublicParams>) -> Self {
        FabtokenValidator { pp }
    }

    fn check_outputs(&self, outputs: &[Token]) -> Result<()> {
        for token in outputs {
            if token.token_type.is_empty() {
                return Err(rejected("output without a token type"));
            }
            token
                .quantity(self.pp.precision)
                .map_err(|e| rejected(format!("invalid output quantity: {}", e)))?;
            token.owner().map_err(|e| rejected(format!("invalid output owner: {}", e)))?;
        }
        Ok(())
    }

    fn record_outputs(
        &self,
        request: &TokenRequest,
        outputs: &[Token],
        cursor: &mut RequestCursor,
        update: &mut StateUpdate,
    ) -> Result<()> {
        for token in outputs {
            let id = TokenId::new(request.anchor.clone(), cursor.next_index);
            cursor.next_index += 1;
            record_output(update, id, token.to_json()?, Some(token))?;
        }
        Ok(())
    }

    fn verify_issue(
        &self,
        ledger: &dyn LedgerReader,
        request: &TokenRequest,
        action: &IssueAction,
        cursor: &mut RequestCursor,
        update: &mut StateUpdate,
    ) -> Result<()> {
        check_issuer(self.pp.as_ref(), &action.issuer, request)?;
        if action.outputs.is_empty() {
            return Err(rejected("issue without outputs"));
        }
        self.check_outputs(&action.outputs)?;
        if action.outputs.iter().any(Token::is_burn) {
            return Err(rejected("issue of a burned token"));
        }
        if let Some(linkage) = &action.linkage {
            record_claim(ledger, linkage, update)?;
        }
        self.record_outputs(request, &action.outputs, cursor, update)
    }

    fn verify_transfer(
        &self,
        ledger: &dyn LedgerReader,
        request: &TokenRequest,
        action: &TransferAction,
        cursor: &mut RequestCursor,
        update: &mut StateUpdate,
    ) -> Result<()> {
        if action.inputs.is_empty() || action.outputs.is_empty() {
            return Err(rejected("transfer needs inputs and outputs"));
        }
        self.check_outputs(&action.outputs)?;
        let output_owners = owners(&action.outputs)?;

        let mut inputs = BTreeMap::new();
        for id in &action.inputs {
            let token = Token::from_json(&load_input(ledger, id, &mut cursor.spent)?)?;
            let owner = token
                .owner()?
                .ok_or_else(|| rejected(format!("token {} is burned", id)))?;
            let outcome = check_unlock(ledger, request, &owner, &output_owners, &action.attributes)?;
            accumulate(&mut inputs, &token.token_type, &token.quantity(self.pp.precision)?)?;
            record_spend(update, id.clone(), outcome);
        }

        let mut outputs = BTreeMap::new();
        for token in &action.outputs {
            accumulate(&mut outputs, &token.token_type, &token.quantity(self.pp.precision)?)?;
        }
        if !balanced(&inputs, &outputs) {
            return Err(rejected("transfer does not conserve value"));
        }
        self.record_outputs(request, &action.outputs, cursor, update)
    }
}

impl Validator for FabtokenValidator {
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
            let action = IssueAction::from_bytes(raw)?;
            self.verify_issue(ledger, request, &action, &mut cursor, &mut update)?;
        }
        for raw in &request.transfers {
            let action = TransferAction::from_bytes(raw)?;
            self.verify_transfer(ledger, request, &action, &mut cursor, &mut update)?;
        }

        debug!(
            "request {} valid: {} spent, {} created",
            request.anchor,
            update.spent.len(),
            update.created.len()
        );
        Ok(update)
    }
}
