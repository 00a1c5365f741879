use interop_core::driver::{
    PublicParameters, SerializedPublicParameters, StateEnv, StateQueryExecutor, StateVerifier,
};
use interop_core::error::{InteropError, Result};
use interop_core::registry::DriverRegistry;
use interop_proofs::keys::QUERY_PUBLIC_PARAMS;
use interop_proofs::ProofQuery;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Keeps one query executor and one verifier per target ledger.
///
/// The driver for a ledger is resolved from its public parameters, fetched
/// through the relay the first time the ledger is seen. Both maps are
/// populated on miss under a write lock after re-checking the entry.
pub struct StateServiceProvider {
    registry: Arc<DriverRegistry>,
    env: StateEnv,
    local: Option<(String, Arc<dyn PublicParameters>)>,
    executors: RwLock<HashMap<String, Arc<dyn StateQueryExecutor>>>,
    verifiers: RwLock<HashMap<String, Arc<dyn StateVerifier>>>,
}

fn poisoned<T>(_: T) -> InteropError {
    InteropError::Other("state service cache lock poisoned".to_string())
}

impl StateServiceProvider {
    pub fn new(registry: Arc<DriverRegistry>, env: StateEnv) -> Self {
        StateServiceProvider {
            registry,
            env,
            local: None,
            executors: RwLock::new(HashMap::new()),
            verifiers: RwLock::new(HashMap::new()),
        }
    }

    /// Use `pp` for the node's own ledger instead of asking the relay
    pub fn with_local(mut self, url: &str, pp: Arc<dyn PublicParameters>) -> Self {
        self.local = Some((url.to_string(), pp));
        self
    }

    /// Public parameters of the ledger at `url`
    pub fn public_parameters(&self, url: &str) -> Result<Arc<dyn PublicParameters>> {
        if let Some((local_url, pp)) = &self.local {
            if local_url == url {
                return Ok(pp.clone());
            }
        }

        let argument = serde_json::to_vec(&ProofQuery::PublicParameters)?;
        let response = self
            .env
            .relay
            .query(url, QUERY_PUBLIC_PARAMS, &argument)
            .map_err(|e| InteropError::RelayQueryFailed(format!("public parameters of [{}]: {}", url, e)))?;
        let envelope = SerializedPublicParameters::from_bytes(&response.result)?;
        debug!("fetched [{}] public parameters of [{}]", envelope.identifier, url);

        let driver = self.registry.lookup(&envelope.identifier)?;
        driver.parse_public_parameters(&envelope.raw)
    }

    /// Query executor for the ledger at `url`
    pub fn query_executor(&self, url: &str) -> Result<Arc<dyn StateQueryExecutor>> {
        if let Some(executor) = self.executors.read().map_err(poisoned)?.get(url) {
            return Ok(executor.clone());
        }

        let mut executors = self.executors.write().map_err(poisoned)?;
        // Another caller may have populated the entry meanwhile
        if let Some(executor) = executors.get(url) {
            return Ok(executor.clone());
        }

        let pp = self.public_parameters(url)?;
        let driver = self.registry.lookup(pp.identifier())?;
        let executor = driver.new_state_query_executor(&self.env, url)?;
        info!("created [{}] query executor for [{}]", pp.identifier(), url);
        executors.insert(url.to_string(), executor.clone());
        Ok(executor)
    }

    /// Verifier for proofs produced by the ledger at `url`
    pub fn verifier(&self, url: &str) -> Result<Arc<dyn StateVerifier>> {
        if let Some(verifier) = self.verifiers.read().map_err(poisoned)?.get(url) {
            return Ok(verifier.clone());
        }

        let mut verifiers = self.verifiers.write().map_err(poisoned)?;
        if let Some(verifier) = verifiers.get(url) {
            return Ok(verifier.clone());
        }

        let pp = self.public_parameters(url)?;
        let driver = self.registry.lookup(pp.identifier())?;
        let verifier = driver.new_state_verifier(&self.env, url, pp.clone())?;
        info!("created [{}] state verifier for [{}]", pp.identifier(), url);
        verifiers.insert(url.to_string(), verifier.clone());
        Ok(verifier)
    }
}
