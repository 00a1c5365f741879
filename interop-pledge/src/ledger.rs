//! An in-process ledger: validates token requests with the scheme validator,
//! applies their writes atomically under a sparse Merkle state root and
//! answers relay queries with committer-signed proofs.

use crate::clock::Clock;
use chrono::{DateTime, Utc};
use interop_core::action::TokenRequest;
use interop_core::driver::{LedgerQuery, LedgerReader, PublicParameters, RelayResponse, StateUpdate, Validator};
use interop_core::error::{InteropError, Result};
use interop_core::id::{TokenId, TxId};
use interop_core::ledger_url::LedgerUrl;
use interop_core::registry::DriverRegistry;
use interop_proofs::keys::{
    existence_key, metadata_key, output_key, public_parameters_key, QUERY_PUBLIC_PARAMS, QUERY_TOKEN_DOES_NOT_EXIST,
    QUERY_TOKEN_EXISTENCE, QUERY_TOKEN_EXISTS_WITH_METADATA,
};
use interop_proofs::{BlockHeader, MerkleTree, ProofQuery, RelayProof, SigningKey, StateRead};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A committed transaction as seen by scanners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedTransaction {
    pub tx_id: TxId,
    pub height: u64,
    /// Public attributes of the transaction's actions
    pub attributes: BTreeMap<String, Vec<u8>>,
}

#[derive(Default)]
struct LedgerState {
    tree: MerkleTree,
    kv: BTreeMap<String, Vec<u8>>,
    outputs: BTreeMap<TokenId, Vec<u8>>,
    anchors: HashSet<TxId>,
    transactions: Vec<CommittedTransaction>,
    headers: Vec<BlockHeader>,
}

impl LedgerState {
    fn put(&mut self, namespace: &str, key: String, value: Vec<u8>) {
        self.tree.insert(namespace, &key, &value);
        self.kv.insert(key, value);
    }

    fn delete(&mut self, namespace: &str, key: &str) {
        self.tree.remove(namespace, key);
        self.kv.remove(key);
    }

    fn apply(&mut self, namespace: &str, update: StateUpdate) {
        for id in &update.spent {
            self.outputs.remove(id);
            self.delete(namespace, &output_key(id));
        }
        for (id, raw) in update.created {
            self.put(namespace, output_key(&id), raw.clone());
            self.outputs.insert(id, raw);
        }
        for (key, value) in update.writes {
            match value {
                Some(value) => self.put(namespace, key, value),
                None => self.delete(namespace, &key),
            }
        }
    }

    fn read(&self, namespace: &str, key: String) -> StateRead {
        StateRead {
            namespace: namespace.to_string(),
            value: self.kv.get(&key).cloned(),
            path: self.tree.generate_proof(namespace, &key),
            key,
        }
    }
}

// The ledger as a validator sees it while a request is being committed
struct PendingBlock<'a> {
    state: &'a LedgerState,
    now: DateTime<Utc>,
}

impl LedgerReader for PendingBlock<'_> {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.state.kv.get(key).cloned())
    }

    fn unspent_output(&self, id: &TokenId) -> Result<Option<Vec<u8>>> {
        Ok(self.state.outputs.get(id).cloned())
    }

    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

/// Single-namespace ledger hosting one token management scope
pub struct MockLedger {
    url: String,
    namespace: String,
    committer: SigningKey,
    clock: Arc<dyn Clock>,
    validator: Arc<dyn Validator>,
    state: RwLock<LedgerState>,
}

impl MockLedger {
    /// Create a ledger at `url` whose genesis holds the public parameters `pp`
    ///
    /// # Parameters
    /// * `url` - Ledger url, also used as the ledger name in block headers
    /// * `pp` - Public parameters; their identifier selects the validator
    /// * `registry` - Drivers the validator is resolved from
    /// * `clock` - Ledger time
    pub fn new(
        url: &str,
        pp: Arc<dyn PublicParameters>,
        registry: &DriverRegistry,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let namespace = LedgerUrl::parse(url)?.tms_id().namespace.clone();
        let validator = registry.lookup(pp.identifier())?.new_validator(pp.clone())?;

        let mut state = LedgerState::default();
        state.put(&namespace, public_parameters_key(), pp.to_envelope()?);

        let ledger = MockLedger {
            url: url.to_string(),
            namespace,
            committer: SigningKey::generate(),
            clock,
            validator,
            state: RwLock::new(state),
        };
        ledger.seal_block(&mut *ledger.write()?);
        info!("ledger [{}] started with [{}] parameters", url, pp.identifier());
        Ok(ledger)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>> {
        self.state
            .read()
            .map_err(|_| InteropError::Other(format!("ledger [{}] lock poisoned", self.url)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerState>> {
        self.state
            .write()
            .map_err(|_| InteropError::Other(format!("ledger [{}] lock poisoned", self.url)))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Verifying key remote networks must trust for this ledger's proofs
    pub fn committer_key(&self) -> [u8; 32] {
        self.committer.verifying_key()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// A header over the current state, linked to the last sealed block
    fn header(&self, state: &LedgerState, height: u64) -> BlockHeader {
        BlockHeader {
            ledger: self.url.clone(),
            height,
            timestamp: self.clock.now(),
            state_root: state.tree.root_hash(),
            prev_hash: state.headers.last().map(BlockHeader::hash),
        }
    }

    fn seal_block(&self, state: &mut LedgerState) -> u64 {
        let height = state.headers.len() as u64 + 1;
        let header = self.header(state, height);
        state.headers.push(header);
        height
    }

    /// Validate and commit a request.
    ///
    /// Nothing is written unless the whole request is valid.
    ///
    /// # Parameters
    /// * `request` - The request; its anchor must be unused on this ledger
    /// * `attributes` - Public attributes recorded for scanners
    ///
    /// # Returns
    /// The height of the block holding the request
    pub fn submit(&self, request: &TokenRequest, attributes: &BTreeMap<String, Vec<u8>>) -> Result<u64> {
        if request.anchor.is_empty() {
            return Err(InteropError::InvalidRequest("request without anchor".to_string()));
        }

        let mut state = self.write()?;
        if state.anchors.contains(&request.anchor) {
            return Err(InteropError::Conflict(format!("transaction {} already committed", request.anchor)));
        }

        let block = PendingBlock {
            state: &*state,
            now: self.clock.now(),
        };
        let update = self.validator.verify_token_request(&block, request).map_err(|e| {
            warn!("[{}] rejected {}: {}", self.url, request.anchor, e);
            e
        })?;

        state.apply(&self.namespace, update);
        state.anchors.insert(request.anchor.clone());
        let height = self.seal_block(&mut state);
        state.transactions.push(CommittedTransaction {
            tx_id: request.anchor.clone(),
            height,
            attributes: attributes.clone(),
        });
        debug!("[{}] committed {} at height {}", self.url, request.anchor, height);
        Ok(height)
    }

    /// Committed transactions starting at `from` inclusive, or all of them
    /// if `from` is unknown
    pub fn transactions_from(&self, from: &TxId) -> Result<Vec<CommittedTransaction>> {
        let state = self.read()?;
        let start = state
            .transactions
            .iter()
            .position(|tx| &tx.tx_id == from)
            .unwrap_or(0);
        Ok(state.transactions[start..].to_vec())
    }

    /// Headers of every sealed block, genesis first
    pub fn headers(&self) -> Result<Vec<BlockHeader>> {
        Ok(self.read()?.headers.clone())
    }

    /// Answer a relay query with a checkpoint proof signed by the committer
    pub fn handle_query(&self, function: &str, argument: &[u8]) -> Result<RelayResponse> {
        let query: ProofQuery = serde_json::from_slice(argument)
            .map_err(|e| InteropError::InvalidRequest(format!("malformed {} argument: {}", function, e)))?;

        let key = match (function, &query) {
            (QUERY_PUBLIC_PARAMS, ProofQuery::PublicParameters) => public_parameters_key(),
            (QUERY_TOKEN_EXISTENCE, ProofQuery::Existence { token_id }) => existence_key(token_id),
            (QUERY_TOKEN_DOES_NOT_EXIST, ProofQuery::NonExistence { token_id, origin, .. })
            | (QUERY_TOKEN_EXISTS_WITH_METADATA, ProofQuery::MetadataExistence { token_id, origin }) => {
                metadata_key(token_id, origin)
            }
            _ => {
                return Err(InteropError::InvalidRequest(format!(
                    "query {:?} does not match function {}",
                    query, function
                )))
            }
        };

        let state = self.read()?;
        let read = state.read(&self.namespace, key);
        let result = read.value.clone().unwrap_or_default();
        // The checkpoint takes the next height and extends the last sealed block
        let header = self.header(&state, state.headers.len() as u64 + 1);
        let parent = state.headers.last().cloned();
        let proof = RelayProof::seal(header, parent, query, vec![read], &self.committer)?;
        debug!(
            "[{}] answered {} at height {}",
            self.url,
            function,
            proof.header.height
        );
        Ok(RelayResponse {
            result,
            proof: proof.to_bytes()?,
        })
    }
}

impl LedgerQuery for MockLedger {
    fn get_state(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        if namespace != self.namespace {
            return Ok(None);
        }
        Ok(self.read()?.kv.get(key).cloned())
    }
}
