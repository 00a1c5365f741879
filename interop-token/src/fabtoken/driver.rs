use super::params::FabtokenPublicParams;
use super::service::FabtokenService;
use super::validator::FabtokenValidator;
use interop_core::config::TmsConfig;
use interop_core::driver::{
    Driver, PublicParameters, StateEnv, StateQueryExecutor, StateVerifier, TokenLoader, TokenService, Validator,
};
use interop_core::error::Result;
use std::sync::Arc;

/// Driver of the plaintext scheme
#[derive(Debug, Default)]
pub struct FabtokenDriver;

impl Driver for FabtokenDriver {
    fn parse_public_parameters(&self, raw: &[u8]) -> Result<Arc<dyn PublicParameters>> {
        Ok(Arc::new(FabtokenPublicParams::from_raw(raw)?))
    }

    fn new_public_parameters(&self, config: &TmsConfig) -> Result<Arc<dyn PublicParameters>> {
        Ok(Arc::new(FabtokenPublicParams::new(
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
        let pp = FabtokenPublicParams::from_dyn(pp.as_ref())?;
        Ok(Arc::new(FabtokenService::new(Arc::new(pp), loader)))
    }

    fn new_validator(&self, pp: Arc<dyn PublicParameters>) -> Result<Arc<dyn Validator>> {
        let pp = FabtokenPublicParams::from_dyn(pp.as_ref())?;
        Ok(Arc::new(FabtokenValidator::new(Arc::new(pp))))
    }

    fn new_state_query_executor(&self, env: &StateEnv, url: &str) -> Result<Arc<dyn StateQueryExecutor>> {
        interop_state::new_relay_query_executor(env, url)
    }

    fn new_state_verifier(
        &self,
        env: &StateEnv,
        url: &str,
        pp: Arc<dyn PublicParameters>,
    ) -> Result<Arc<dyn StateVerifier>> {
        interop_state::new_committed_state_verifier(env, url, pp)
    }
}
