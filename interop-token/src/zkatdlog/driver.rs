use super::params::ZkatdlogPublicParams;
use super::range::{BitDecomposition, RangeProver};
use super::service::ZkatdlogService;
use super::validator::ZkatdlogValidator;
use interop_core::config::TmsConfig;
use interop_core::driver::{
    Driver, PublicParameters, StateEnv, StateQueryExecutor, StateVerifier, TokenLoader, TokenService, Validator,
};
use interop_core::error::Result;
use std::sync::Arc;

/// Driver of the committed-quantity scheme
pub struct ZkatdlogDriver {
    ranges: Arc<dyn RangeProver>,
}

impl ZkatdlogDriver {
    /// Driver whose services and validators share `ranges`
    pub fn new(ranges: Arc<dyn RangeProver>) -> Self {
        ZkatdlogDriver { ranges }
    }
}

impl Default for ZkatdlogDriver {
    fn default() -> Self {
        Self::new(Arc::new(BitDecomposition))
    }
}

impl Driver for ZkatdlogDriver {
    fn parse_public_parameters(&self, raw: &[u8]) -> Result<Arc<dyn PublicParameters>> {
        Ok(Arc::new(ZkatdlogPublicParams::from_raw(raw)?))
    }

    fn new_public_parameters(&self, config: &TmsConfig) -> Result<Arc<dyn PublicParameters>> {
        Ok(Arc::new(ZkatdlogPublicParams::new(
            config.precision,
            config.issuer_identities(),
            config.auditor_identities(),
        )?))
    }

    fn new_token_service(
        &self,
        pp: Arc<dyn PublicParameters>,
        loader: Arc<dyn TokenLoader>,
    ) -> Result<Arc<dyn TokenService>> {
        let pp = ZkatdlogPublicParams::from_dyn(pp.as_ref())?;
        Ok(Arc::new(ZkatdlogService::new(Arc::new(pp), loader, self.ranges.clone())?))
    }

    fn new_validator(&self, pp: Arc<dyn PublicParameters>) -> Result<Arc<dyn Validator>> {
        let pp = ZkatdlogPublicParams::from_dyn(pp.as_ref())?;
        Ok(Arc::new(ZkatdlogValidator::new(Arc::new(pp), self.ranges.clone())?))
    }

    // Pledges are disclosed in clear, so proofs about them are the same as
    // for the plaintext scheme
    fn new_state_query_executor(&self, env: &StateEnv, url: &str) -> Result<Arc<dyn StateQueryExecutor>> {
        interop_state::new_relay_query_executor(env, url)
    }

    fn new_state_verifier(
        &self,
        env: &StateEnv,
        url: &str,
        pp: Arc<dyn PublicParameters>,
    ) -> Result<Arc<dyn StateVerifier>> {
        ZkatdlogPublicParams::from_dyn(pp.as_ref())?;
        interop_state::new_committed_state_verifier(env, url, pp)
    }
}
