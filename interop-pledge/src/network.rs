//! In-process interop network: one ledger and one token management scope per
//! configured scope, reachable from each other through a shared relay.

use crate::clock::Clock;
use crate::ledger::MockLedger;
use crate::relay::LocalRelay;
use crate::tms::{Tms, TmsParts};
use crate::tokens::TokenVault;
use crate::vault::InMemoryPledgeVault;
use crate::wallet::WalletManager;
use interop_core::config::InteropConfig;
use interop_core::driver::{PledgeVault, StateEnv};
use interop_core::error::{InteropError, Result};
use interop_core::id::Identity;
use interop_core::ledger_url::TmsId;
use interop_core::registry::DriverRegistry;
use interop_state::{StateServiceProvider, TrustStore};
use interop_token::{default_registry, public_parameters_from_config};
use log::info;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub struct InteropNetwork {
    config: InteropConfig,
    registry: Arc<DriverRegistry>,
    relay: Arc<LocalRelay>,
    anchors: Arc<TrustStore>,
    wallets: Arc<WalletManager>,
    clock: Arc<dyn Clock>,
    scopes: RwLock<HashMap<TmsId, Arc<Tms>>>,
}

impl InteropNetwork {
    pub fn new(config: &InteropConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(InteropNetwork {
            config: config.clone(),
            registry: Arc::new(default_registry()),
            relay: Arc::new(LocalRelay::new()),
            anchors: Arc::new(TrustStore::from_config(&config.trust_anchors)?),
            wallets: Arc::new(WalletManager::new()),
            clock,
            scopes: RwLock::new(HashMap::new()),
        })
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn relay(&self) -> &Arc<LocalRelay> {
        &self.relay
    }

    /// Register a party hosted by this node under `label`
    pub fn wallet(&self, label: &str) -> Identity {
        self.wallets.register(label)
    }

    /// The scope `id`, started with an in-memory pledge vault the first time
    pub fn open(&self, id: &TmsId) -> Result<Arc<Tms>> {
        self.open_with_vault(id, Arc::new(InMemoryPledgeVault::new()))
    }

    /// The scope `id`, started with `pledges` the first time it is opened
    pub fn open_with_vault(&self, id: &TmsId, pledges: Arc<dyn PledgeVault>) -> Result<Arc<Tms>> {
        let existing = self
            .scopes
            .read()
            .map_err(|_| InteropError::Other("network lock poisoned".to_string()))?
            .get(id)
            .cloned();
        if let Some(tms) = existing {
            return Ok(tms);
        }

        let mut scopes = self
            .scopes
            .write()
            .map_err(|_| InteropError::Other("network lock poisoned".to_string()))?;
        if let Some(tms) = scopes.get(id) {
            return Ok(tms.clone());
        }

        let config = self
            .config
            .tms(id)
            .ok_or_else(|| InteropError::Config(format!("no tms configured for [{}]", id)))?
            .clone();
        let url = config.url()?.to_string();
        let pp = public_parameters_from_config(&self.registry, &config)?;

        let ledger = Arc::new(MockLedger::new(&url, pp.clone(), &self.registry, self.clock.clone())?);
        self.relay.register(ledger.clone())?;
        self.anchors.add(&url, ledger.committer_key())?;

        let tokens = Arc::new(TokenVault::new());
        let service = self
            .registry
            .lookup(&config.driver)?
            .new_token_service(pp.clone(), tokens.clone())?;
        let env = StateEnv {
            relay: self.relay.clone(),
            pledges: pledges.clone(),
            anchors: self.anchors.clone(),
        };
        let provider = StateServiceProvider::new(self.registry.clone(), env).with_local(&url, pp);

        let tms = Arc::new(Tms::new(TmsParts {
            config,
            ledger,
            service,
            provider,
            pledges,
            tokens,
            wallets: self.wallets.clone(),
            clock: self.clock.clone(),
            scan: self.config.scan.clone(),
        })?);
        info!("opened tms [{}] at [{}]", id, url);
        scopes.insert(id.clone(), tms.clone());
        Ok(tms)
    }
}
