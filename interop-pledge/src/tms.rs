//! The token management scope of one ledger and the pledge protocol
//! operations it offers.

use crate::clock::Clock;
use crate::ledger::MockLedger;
use crate::tokens::{CreatedOutput, PledgedToken, TokenVault};
use crate::wallet::WalletManager;
use chrono::{DateTime, Utc};
use interop_core::action::{
    ClaimLinkage, IssueOptions, TokenRequest, TokenRequestMetadata, TransferOptions, PLEDGE_ID_ATTRIBUTE,
};
use interop_core::config::{ScanConfig, TmsConfig};
use interop_core::driver::{AuditInfoProvider, LedgerQuery, PledgeInfo, PledgeVault, TokenService};
use interop_core::error::{ErrorKind, InteropError, MismatchField, Result};
use interop_core::id::{Identity, PledgeId, TokenId, TxId};
use interop_core::ledger_url::LedgerUrl;
use interop_core::quantity::Quantity;
use interop_core::token::{Owner, PledgeScript, Token};
use interop_proofs::keys::outcome_key;
use interop_proofs::PledgeOutcome;
use interop_state::StateServiceProvider;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Collaborators of a [`Tms`], wired by the network that hosts it
pub struct TmsParts {
    pub config: TmsConfig,
    pub ledger: Arc<MockLedger>,
    pub service: Arc<dyn TokenService>,
    pub provider: StateServiceProvider,
    pub pledges: Arc<dyn PledgeVault>,
    pub tokens: Arc<TokenVault>,
    pub wallets: Arc<WalletManager>,
    pub clock: Arc<dyn Clock>,
    pub scan: ScanConfig,
}

/// Token management scope of one ledger.
///
/// Every operation returns once its request is committed; local vaults are
/// only updated after the ledger accepted the request.
pub struct Tms {
    config: TmsConfig,
    url: String,
    precision: u32,
    ledger: Arc<MockLedger>,
    service: Arc<dyn TokenService>,
    provider: StateServiceProvider,
    pledges: Arc<dyn PledgeVault>,
    tokens: Arc<TokenVault>,
    wallets: Arc<WalletManager>,
    clock: Arc<dyn Clock>,
    scan: ScanConfig,
    auditor: RwLock<Option<Identity>>,
    sequence: AtomicU64,
}

fn on_conflict(e: InteropError, wrap: impl FnOnce(String) -> InteropError) -> InteropError {
    match e {
        InteropError::Conflict(msg) => wrap(msg),
        other => other,
    }
}

/// Wrap a proof failure, letting state conflicts through untouched
fn on_proof_failure(e: InteropError, wrap: impl FnOnce(Box<InteropError>) -> InteropError) -> InteropError {
    if e.kind() == ErrorKind::StateConflict {
        return e;
    }
    wrap(Box::new(e))
}

fn check_token_id(token_id: &TokenId) -> Result<()> {
    if token_id.tx_id.is_empty() {
        return Err(InteropError::InvalidRequest("token id without transaction".to_string()));
    }
    Ok(())
}

impl Tms {
    pub fn new(parts: TmsParts) -> Result<Self> {
        let url = parts.config.url()?.to_string();
        if url != parts.ledger.url() {
            return Err(InteropError::Config(format!(
                "tms [{}] wired to ledger [{}]",
                url,
                parts.ledger.url()
            )));
        }
        Ok(Tms {
            precision: parts.service.public_parameters().precision(),
            config: parts.config,
            url,
            ledger: parts.ledger,
            service: parts.service,
            provider: parts.provider,
            pledges: parts.pledges,
            tokens: parts.tokens,
            wallets: parts.wallets,
            clock: parts.clock,
            scan: parts.scan,
            auditor: RwLock::new(None),
            sequence: AtomicU64::new(0),
        })
    }

    /// Ledger url of this scope, the value pledges name as destination network
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn config(&self) -> &TmsConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<MockLedger> {
        &self.ledger
    }

    pub fn wallets(&self) -> &Arc<WalletManager> {
        &self.wallets
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn next_tx_id(&self) -> TxId {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        TxId::derive(&[self.url.as_bytes(), &n.to_le_bytes()])
    }

    fn quantity(&self, amount: u64) -> Result<Quantity> {
        if amount == 0 {
            return Err(InteropError::InvalidRequest("amount must be positive".to_string()));
        }
        Quantity::from_u64(amount, self.precision)
    }

    /// Audit, commit, then record the outputs the request created
    fn submit(
        &self,
        mut request: TokenRequest,
        metadata: TokenRequestMetadata,
        attributes: &BTreeMap<String, Vec<u8>>,
    ) -> Result<()> {
        if request.anchor.is_empty() {
            return Err(InteropError::InvalidRequest("request without transaction id".to_string()));
        }
        let auditor = self
            .auditor
            .read()
            .map_err(|_| InteropError::Other("auditor lock poisoned".to_string()))?
            .clone();
        if let Some(auditor) = auditor {
            self.service.auditor_check(&request, &metadata)?;
            request.auditor = Some(auditor.clone());
            request.add_signer(&auditor);
        }

        self.ledger.submit(&request, attributes)?;

        let spent: Vec<TokenId> = metadata
            .transfers
            .iter()
            .flat_map(|t| t.token_ids.iter().cloned())
            .collect();
        let created = metadata
            .outputs(&request.anchor)
            .into_iter()
            .map(|(id, output, opening)| {
                Ok(CreatedOutput {
                    id,
                    token: self.service.deobfuscate(output, opening)?,
                    output: output.to_vec(),
                    opening: opening.to_vec(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.tokens.apply(&spent, created)
    }

    /// Inspect every request submitted from now on as `auditor`
    pub fn register_auditor(&self, auditor: &Identity) -> Result<()> {
        let pp = self.service.public_parameters();
        if !pp.auditors().is_empty() && !pp.auditors().contains(auditor) {
            return Err(InteropError::InvalidRequest(format!(
                "{} is not an auditor of [{}]",
                auditor, self.url
            )));
        }
        *self
            .auditor
            .write()
            .map_err(|_| InteropError::Other("auditor lock poisoned".to_string()))? = Some(auditor.clone());
        info!("[{}] audited by {}", self.url, auditor);
        Ok(())
    }

    pub fn issue(&self, issuer: &Identity, token_type: &str, amount: u64, recipient: &Identity) -> Result<TxId> {
        self.quantity(amount)?;
        let tx_id = self.next_tx_id();
        let (action, metadata) = self.service.issue(
            issuer,
            token_type,
            &[amount],
            &[Owner::Identity(recipient.clone())],
            &IssueOptions::default(),
            self.wallets.as_ref(),
        )?;

        let mut request = TokenRequest::new(tx_id.clone());
        request.add_signer(issuer);
        request.issues.push(action);
        self.submit(
            request,
            TokenRequestMetadata {
                issues: vec![metadata],
                ..Default::default()
            },
            &BTreeMap::new(),
        )?;
        info!("[{}] issued {} [{}] to {} in {}", self.url, amount, token_type, recipient, tx_id);
        Ok(tx_id)
    }

    /// Sum of the unspent tokens of a type held directly by `wallet`
    pub fn balance(&self, wallet: &Identity, token_type: &str) -> Result<Quantity> {
        self.tokens.balance(wallet, token_type, self.precision)
    }

    /// Unspent pledges of this ledger in which a wallet hosted by this node
    /// takes part
    pub fn pledged_tokens(&self, wallet: &Identity) -> Result<Vec<PledgedToken>> {
        if !self.wallets.is_local(wallet) {
            return Err(InteropError::InvalidRequest(format!("{} is not hosted by this node", wallet)));
        }
        self.tokens.pledged(wallet)
    }

    /// Lock `amount` of `wallet`'s tokens for `recipient` on another ledger
    ///
    /// # Parameters
    /// * `wallet` - The sender
    /// * `token_type` - Type of the pledged tokens
    /// * `amount` - Pledged value
    /// * `recipient` - Who may claim on the destination ledger
    /// * `issuer` - Who redeems the pledge on this ledger once claimed
    /// * `destination` - Url of the destination ledger
    /// * `deadline` - After it, the sender may reclaim if nothing was claimed
    ///
    /// # Returns
    /// The pledge transaction, whose output 0 is the pledged token, and the pledge id
    #[allow(clippy::too_many_arguments)]
    pub fn pledge(
        &self,
        wallet: &Identity,
        token_type: &str,
        amount: u64,
        recipient: &Identity,
        issuer: &Identity,
        destination: &str,
        deadline: DateTime<Utc>,
    ) -> Result<(TxId, PledgeId)> {
        LedgerUrl::parse(destination)?;
        let quantity = self.quantity(amount)?;
        let (inputs, total) = self.tokens.select(wallet, token_type, &quantity)?;

        let tx_id = self.next_tx_id();
        let pledge_id = PledgeId::derive(&tx_id, wallet);
        let script = PledgeScript {
            sender: wallet.clone(),
            recipient: recipient.clone(),
            issuer: issuer.clone(),
            id: pledge_id.clone(),
            deadline,
            destination_network: destination.to_string(),
        };
        let mut outputs = vec![Token::new(&Owner::Pledge(script.clone()), token_type, &quantity)?];
        let change = total.checked_sub(&quantity)?;
        if !change.is_zero() {
            outputs.push(Token::new(&Owner::Identity(wallet.clone()), token_type, &change)?);
        }

        let opts = TransferOptions::default().with_attribute(PLEDGE_ID_ATTRIBUTE, pledge_id.as_str().as_bytes());
        let (action, metadata) = self
            .service
            .transfer(&tx_id, &inputs, &outputs, &opts, self.wallets.as_ref())?;
        let mut request = TokenRequest::new(tx_id.clone());
        request.add_signer(wallet);
        request.transfers.push(action);
        self.submit(
            request,
            TokenRequestMetadata {
                transfers: vec![metadata],
                ..Default::default()
            },
            &opts.attributes,
        )?;

        self.pledges.store(&PledgeInfo {
            source: self.url.clone(),
            token_id: TokenId::new(tx_id.clone(), 0),
            token_type: token_type.to_string(),
            amount,
            script,
        })?;
        info!(
            "[{}] pledged {} [{}] for [{}] as {}",
            self.url, amount, token_type, destination, pledge_id
        );
        Ok((tx_id, pledge_id))
    }

    /// Record on this, the destination side, a pledge made on another ledger
    pub fn accept_pledge(&self, info: &PledgeInfo) -> Result<()> {
        if info.script.destination_network != self.url {
            return Err(InteropError::InvalidRequest(format!(
                "pledge {} targets [{}], not [{}]",
                info.script.id, info.script.destination_network, self.url
            )));
        }
        self.pledges.store(info)
    }

    pub fn pledge_by_id(&self, pledge_id: &PledgeId) -> Result<Option<PledgeInfo>> {
        self.pledges.pledge_by_id(pledge_id)
    }

    /// The pledge of `token_id` made on this ledger when `local`, or accepted
    /// from another ledger otherwise
    fn pledge_of(&self, token_id: &TokenId, local: bool) -> Result<PledgeInfo> {
        check_token_id(token_id)?;
        let pledges = self.pledges.pledge_by_token_id(token_id)?;
        if pledges.is_empty() {
            return Err(InteropError::NotFound(format!("no pledge recorded for token {}", token_id)));
        }
        pledges
            .into_iter()
            .find(|info| (info.source == self.url) == local)
            .ok_or_else(|| {
                let side = if local { "accepted from another ledger" } else { "made on this ledger" };
                InteropError::InvalidRequest(format!("pledge of {} was {}", token_id, side))
            })
    }

    /// How a pledged token of this ledger was released, if it was
    fn outcome(&self, token_id: &TokenId) -> Result<Option<PledgeOutcome>> {
        self.ledger
            .get_state(self.ledger.namespace(), &outcome_key(token_id))?
            .map(|raw| PledgeOutcome::from_bytes(&raw))
            .transpose()
    }

    /// Issue on this ledger the counterpart of a token pledged elsewhere
    ///
    /// # Parameters
    /// * `recipient` - The recipient named by the pledge
    /// * `issuer` - Issuer of this ledger minting the claimed tokens
    /// * `origin_token_id` - The pledged token on the origin ledger
    pub fn claim(&self, recipient: &Identity, issuer: &Identity, origin_token_id: &TokenId) -> Result<TxId> {
        let info = self.pledge_of(origin_token_id, false)?;
        if &info.script.recipient != recipient {
            return Err(InteropError::mismatch(
                MismatchField::Recipient,
                &info.script.recipient,
                recipient,
            ));
        }

        let proof = self
            .provider
            .query_executor(&info.source)
            .and_then(|executor| executor.exist(origin_token_id))
            .and_then(|proof| {
                self.provider.verifier(&info.source)?.verify_proof_existence(
                    &proof,
                    origin_token_id,
                    Some(info.script.id.as_str().as_bytes()),
                )?;
                Ok(proof)
            })
            .map_err(|e| on_proof_failure(e, InteropError::ClaimProofInvalid))?;

        let tx_id = self.next_tx_id();
        let opts = IssueOptions {
            linkage: Some(ClaimLinkage {
                origin_token_id: origin_token_id.clone(),
                origin_network: info.source.clone(),
                deadline: info.script.deadline,
            }),
            proof: Some(proof),
        };
        let (action, metadata) = self.service.issue(
            issuer,
            &info.token_type,
            &[info.amount],
            &[Owner::Identity(recipient.clone())],
            &opts,
            self.wallets.as_ref(),
        )?;
        let mut request = TokenRequest::new(tx_id.clone());
        request.add_signer(issuer);
        request.add_signer(recipient);
        request.issues.push(action);
        self.submit(
            request,
            TokenRequestMetadata {
                issues: vec![metadata],
                ..Default::default()
            },
            &BTreeMap::new(),
        )
        .map_err(|e| on_conflict(e, InteropError::AlreadyClaimedOrReclaimed))?;

        info!("[{}] claimed {} from [{}] in {}", self.url, origin_token_id, info.source, tx_id);
        Ok(tx_id)
    }

    /// Burn a pledged token of this ledger once its claim is proven on the destination
    pub fn redeem(&self, issuer: &Identity, token_id: &TokenId) -> Result<TxId> {
        let info = self.pledge_of(token_id, true)?;
        match self.outcome(token_id)? {
            Some(PledgeOutcome::Redeemed) => return Err(InteropError::AlreadyRedeemed(token_id.to_string())),
            Some(PledgeOutcome::Reclaimed) => {
                return Err(InteropError::AlreadyClaimedOrReclaimed(token_id.to_string()))
            }
            None => {}
        }
        if self.tokens.get(token_id)?.is_none() {
            return Err(InteropError::NotFound(format!("pledged token {} is not unspent", token_id)));
        }

        let destination = &info.script.destination_network;
        self.provider
            .query_executor(destination)
            .and_then(|executor| executor.exists_with_metadata(token_id, &self.url))
            .and_then(|proof| {
                self.provider
                    .verifier(destination)?
                    .verify_proof_token_with_metadata_existence(&proof, token_id, &self.url)
            })
            .map_err(|e| on_proof_failure(e, InteropError::RedeemProofInvalid))?;

        let tx_id = self.next_tx_id();
        let quantity = self.quantity(info.amount)?;
        let outputs = vec![Token::burn(&info.token_type, &quantity)];
        let (action, metadata) = self.service.transfer(
            &tx_id,
            &[token_id.clone()],
            &outputs,
            &TransferOptions::default(),
            self.wallets.as_ref(),
        )?;
        let mut request = TokenRequest::new(tx_id.clone());
        request.add_signer(issuer);
        request.transfers.push(action);
        self.submit(
            request,
            TokenRequestMetadata {
                transfers: vec![metadata],
                ..Default::default()
            },
            &BTreeMap::new(),
        )
        .map_err(|e| on_conflict(e, InteropError::AlreadyRedeemed))?;

        info!("[{}] redeemed {} in {}", self.url, token_id, tx_id);
        Ok(tx_id)
    }

    /// Return a pledged token to its sender after the deadline, once it is
    /// proven that nothing was claimed
    pub fn reclaim(&self, wallet: &Identity, token_id: &TokenId) -> Result<TxId> {
        let info = self.pledge_of(token_id, true)?;
        if &info.script.sender != wallet {
            return Err(InteropError::InvalidRequest(format!(
                "{} did not pledge {}",
                wallet, token_id
            )));
        }
        if self.clock.now() < info.script.deadline {
            return Err(InteropError::DeadlineNotReached {
                deadline: info.script.deadline,
            });
        }
        if let Some(outcome) = self.outcome(token_id)? {
            return Err(InteropError::AlreadyClaimedOrReclaimed(format!(
                "{} already {}",
                token_id,
                String::from_utf8_lossy(outcome.as_bytes())
            )));
        }

        let destination = &info.script.destination_network;
        self.provider
            .query_executor(destination)
            .and_then(|executor| executor.does_not_exist(token_id, &self.url, info.script.deadline))
            .and_then(|proof| {
                self.provider.verifier(destination)?.verify_proof_non_existence(
                    &proof,
                    token_id,
                    &self.url,
                    info.script.deadline,
                )
            })
            .map_err(|e| on_proof_failure(e, InteropError::NonExistenceProofInvalid))?;

        let tx_id = self.next_tx_id();
        let quantity = self.quantity(info.amount)?;
        let outputs = vec![Token::new(&Owner::Identity(wallet.clone()), &info.token_type, &quantity)?];
        let (action, metadata) = self.service.transfer(
            &tx_id,
            &[token_id.clone()],
            &outputs,
            &TransferOptions::default(),
            self.wallets.as_ref(),
        )?;
        let mut request = TokenRequest::new(tx_id.clone());
        request.add_signer(wallet);
        request.transfers.push(action);
        self.submit(
            request,
            TokenRequestMetadata {
                transfers: vec![metadata],
                ..Default::default()
            },
            &BTreeMap::new(),
        )
        .map_err(|e| on_conflict(e, InteropError::AlreadyClaimedOrReclaimed))?;

        info!("[{}] reclaimed {} in {}", self.url, token_id, tx_id);
        Ok(tx_id)
    }

    /// Wait for a committed transaction carrying `pledge_id`, looking from
    /// `from` onwards
    pub fn scan_pledge(&self, pledge_id: &PledgeId, from: &TxId, timeout: Duration) -> Result<bool> {
        let started = self.clock.now();
        loop {
            let found = self.ledger.transactions_from(from)?.iter().any(|tx| {
                tx.attributes.get(PLEDGE_ID_ATTRIBUTE).map(Vec::as_slice) == Some(pledge_id.as_str().as_bytes())
            });
            if found {
                debug!("[{}] found pledge {}", self.url, pledge_id);
                return Ok(true);
            }

            let elapsed = (self.clock.now() - started).to_std().unwrap_or_default();
            if elapsed >= timeout {
                warn!("[{}] scan for pledge {} timed out", self.url, pledge_id);
                return Err(InteropError::ScanTimeout);
            }
            self.clock.sleep(self.scan.poll_interval().min(timeout - elapsed));
        }
    }
}
