//! Seams between the protocol and its collaborators: token schemes, ledgers,
//! relays and the local pledge store.

use crate::action::{
    IssueMetadata, IssueOptions, TokenRequest, TokenRequestMetadata, TransferMetadata,
    TransferOptions,
};
use crate::config::TmsConfig;
use crate::error::Result;
use crate::id::{Identity, PledgeId, TokenId, TxId};
use crate::token::{Owner, PledgeScript, Token};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Public parameters of a token scheme instance
pub trait PublicParameters: fmt::Debug + Send + Sync {
    /// The scheme identifier used to resolve the driver
    fn identifier(&self) -> &str;

    /// Precision, in bits, of every quantity of this instance
    fn precision(&self) -> u32;

    /// Identities allowed to issue; empty means anyone may issue
    fn issuers(&self) -> &[Identity];

    fn auditors(&self) -> &[Identity];

    /// Serialize into the envelope stored on the ledger
    fn to_envelope(&self) -> Result<Vec<u8>>;
}

/// The envelope wrapping scheme-specific public parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedPublicParameters {
    pub identifier: String,
    pub raw: Vec<u8>,
}

impl SerializedPublicParameters {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}

/// Gives the audit info of identities owned by local wallets
pub trait AuditInfoProvider: Send + Sync {
    fn audit_info(&self, identity: &Identity) -> Result<Vec<u8>>;

    /// True if the identity belongs to a local wallet
    fn is_local(&self, identity: &Identity) -> bool;
}

/// A committed output together with the holder's opening of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedToken {
    pub id: TokenId,
    pub output: Vec<u8>,
    pub output_metadata: Vec<u8>,
}

/// Loads the outputs referenced as transfer inputs
pub trait TokenLoader: Send + Sync {
    fn load_tokens(&self, ids: &[TokenId]) -> Result<Vec<LoadedToken>>;
}

/// Builds actions and inspects them, for one scheme instance
pub trait TokenService: Send + Sync {
    fn public_parameters(&self) -> Arc<dyn PublicParameters>;

    /// Build an issue action
    ///
    /// # Parameters
    /// * `issuer` - The issuing identity
    /// * `token_type` - Type of the issued tokens
    /// * `values` - One value per output
    /// * `owners` - One owner per output
    /// * `opts` - Claim linkage and proof, when the issue mirrors a pledge
    /// * `audit` - Source of the receivers' audit info
    ///
    /// # Returns
    /// The serialized action and its off-ledger metadata
    fn issue(
        &self,
        issuer: &Identity,
        token_type: &str,
        values: &[u64],
        owners: &[Owner],
        opts: &IssueOptions,
        audit: &dyn AuditInfoProvider,
    ) -> Result<(Vec<u8>, IssueMetadata)>;

    /// Build a transfer action spending `inputs` into `outputs`
    fn transfer(
        &self,
        tx_id: &TxId,
        inputs: &[TokenId],
        outputs: &[Token],
        opts: &TransferOptions,
        audit: &dyn AuditInfoProvider,
    ) -> Result<(Vec<u8>, TransferMetadata)>;

    /// Recover the plaintext token of an output given its opening
    fn deobfuscate(&self, output: &[u8], output_metadata: &[u8]) -> Result<Token>;

    /// Open every commitment of the request and check value conservation
    fn auditor_check(&self, request: &TokenRequest, metadata: &TokenRequestMetadata) -> Result<()>;
}

/// Read-only key/value access to the committed state of a namespace
pub trait LedgerQuery: Send + Sync {
    fn get_state(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>>;
}

/// View of a ledger handed to validators while a request is being committed
pub trait LedgerReader {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn unspent_output(&self, id: &TokenId) -> Result<Option<Vec<u8>>>;

    /// Ledger time of the block being built
    fn now(&self) -> DateTime<Utc>;
}

/// The writes a valid request produces, applied by the ledger atomically
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateUpdate {
    pub spent: Vec<TokenId>,
    pub created: Vec<(TokenId, Vec<u8>)>,
    pub writes: BTreeMap<String, Option<Vec<u8>>>,
}

impl StateUpdate {
    pub fn put(&mut self, key: String, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    pub fn delete(&mut self, key: String) {
        self.writes.insert(key, None);
    }
}

pub trait Validator: Send + Sync {
    fn verify_token_request(&self, ledger: &dyn LedgerReader, request: &TokenRequest) -> Result<StateUpdate>;
}

/// Answer of a relay: the query result and the proof backing it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayResponse {
    pub result: Vec<u8>,
    pub proof: Vec<u8>,
}

/// Bridges this node to other ledgers
pub trait Relay: Send + Sync {
    fn query(&self, target_url: &str, function: &str, argument: &[u8]) -> Result<RelayResponse>;
}

/// Requests proofs about one target ledger
pub trait StateQueryExecutor: Send + Sync {
    fn exist(&self, token_id: &TokenId) -> Result<Vec<u8>>;

    fn does_not_exist(&self, token_id: &TokenId, origin: &str, deadline: DateTime<Utc>) -> Result<Vec<u8>>;

    fn exists_with_metadata(&self, token_id: &TokenId, origin: &str) -> Result<Vec<u8>>;
}

/// Checks proofs produced by one target ledger
pub trait StateVerifier: Send + Sync {
    fn verify_proof_existence(&self, proof: &[u8], token_id: &TokenId, metadata: Option<&[u8]>) -> Result<()>;

    fn verify_proof_non_existence(
        &self,
        proof: &[u8],
        token_id: &TokenId,
        origin: &str,
        deadline: DateTime<Utc>,
    ) -> Result<()>;

    fn verify_proof_token_with_metadata_existence(&self, proof: &[u8], token_id: &TokenId, origin: &str) -> Result<()>;
}

/// What a node remembers about a pledge it takes part in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PledgeInfo {
    /// Ledger url of the origin network
    pub source: String,
    pub token_id: TokenId,
    pub token_type: String,
    pub amount: u64,
    pub script: PledgeScript,
}

pub trait PledgeVault: Send + Sync {
    fn store(&self, info: &PledgeInfo) -> Result<()>;

    fn pledge_by_token_id(&self, token_id: &TokenId) -> Result<Vec<PledgeInfo>>;

    fn pledge_by_id(&self, pledge_id: &PledgeId) -> Result<Option<PledgeInfo>>;
}

/// Committer keys trusted for each ledger url
pub trait TrustAnchors: Send + Sync {
    fn committer_key(&self, ledger_url: &str) -> Option<[u8; 32]>;
}

/// Collaborators shared by the query executors and verifiers of a node
#[derive(Clone)]
pub struct StateEnv {
    pub relay: Arc<dyn Relay>,
    pub pledges: Arc<dyn PledgeVault>,
    pub anchors: Arc<dyn TrustAnchors>,
}

/// A token scheme
pub trait Driver: Send + Sync {
    /// Parse the scheme-specific body of a public-parameters envelope
    fn parse_public_parameters(&self, raw: &[u8]) -> Result<Arc<dyn PublicParameters>>;

    /// Fresh public parameters for a configured scope
    fn new_public_parameters(&self, config: &TmsConfig) -> Result<Arc<dyn PublicParameters>>;

    fn new_token_service(
        &self,
        pp: Arc<dyn PublicParameters>,
        loader: Arc<dyn TokenLoader>,
    ) -> Result<Arc<dyn TokenService>>;

    fn new_validator(&self, pp: Arc<dyn PublicParameters>) -> Result<Arc<dyn Validator>>;

    fn new_state_query_executor(&self, env: &StateEnv, url: &str) -> Result<Arc<dyn StateQueryExecutor>>;

    /// # Parameters
    /// * `env` - Shared collaborators
    /// * `url` - The ledger whose proofs the verifier checks
    /// * `pp` - Public parameters of that ledger
    fn new_state_verifier(
        &self,
        env: &StateEnv,
        url: &str,
        pp: Arc<dyn PublicParameters>,
    ) -> Result<Arc<dyn StateVerifier>>;
}
