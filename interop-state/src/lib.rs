pub mod adapter;
pub mod anchors;
pub mod provider;
pub mod query_executor;
pub mod verifier;

// Re-export the main types for convenience
pub use adapter::{CommittedStateAdapter, LedgerProof, ProofAdapter};
pub use anchors::TrustStore;
pub use provider::StateServiceProvider;
pub use query_executor::RelayQueryExecutor;
pub use verifier::RelayStateVerifier;

use interop_core::driver::{PublicParameters, StateEnv, StateQueryExecutor, StateVerifier};
use interop_core::error::Result;
use interop_core::ledger_url::LedgerUrl;
use std::sync::Arc;

/// Query executor for a ledger reached through the relay
pub fn new_relay_query_executor(env: &StateEnv, url: &str) -> Result<Arc<dyn StateQueryExecutor>> {
    LedgerUrl::parse(url)?;
    Ok(Arc::new(RelayQueryExecutor::new(env.relay.clone(), url)))
}

/// Verifier for proofs signed by the committer of a ledger reached through the relay
pub fn new_committed_state_verifier(
    env: &StateEnv,
    url: &str,
    pp: Arc<dyn PublicParameters>,
) -> Result<Arc<dyn StateVerifier>> {
    let ledger = LedgerUrl::parse(url)?;
    let adapter = Arc::new(CommittedStateAdapter::new(url, env.anchors.clone()));
    Ok(Arc::new(RelayStateVerifier::new(
        url,
        &ledger.tms_id().namespace,
        pp.precision(),
        env.pledges.clone(),
        adapter,
    )))
}
