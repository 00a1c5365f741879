use crate::ledger::MockLedger;
use interop_core::driver::{Relay, RelayResponse};
use interop_core::error::{InteropError, Result};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Routes relay queries to in-process ledgers by url
#[derive(Default)]
pub struct LocalRelay {
    ledgers: RwLock<HashMap<String, Arc<MockLedger>>>,
}

impl LocalRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, ledger: Arc<MockLedger>) -> Result<()> {
        let mut ledgers = self
            .ledgers
            .write()
            .map_err(|_| InteropError::Other("relay lock poisoned".to_string()))?;
        debug!("relay reaches [{}]", ledger.url());
        ledgers.insert(ledger.url().to_string(), ledger);
        Ok(())
    }
}

impl Relay for LocalRelay {
    fn query(&self, target_url: &str, function: &str, argument: &[u8]) -> Result<RelayResponse> {
        let ledger = self
            .ledgers
            .read()
            .map_err(|_| InteropError::Other("relay lock poisoned".to_string()))?
            .get(target_url)
            .cloned()
            .ok_or_else(|| InteropError::RelayQueryFailed(format!("no route to [{}]", target_url)))?;
        ledger.handle_query(function, argument)
    }
}
