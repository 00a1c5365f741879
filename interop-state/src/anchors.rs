use interop_core::config::TrustAnchorConfig;
use interop_core::driver::TrustAnchors;
use interop_core::error::{InteropError, Result};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::RwLock;

/// Committer keys trusted per ledger url
#[derive(Debug, Default)]
pub struct TrustStore {
    keys: RwLock<HashMap<String, [u8; 32]>>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(anchors: &[TrustAnchorConfig]) -> Result<Self> {
        let store = TrustStore::new();
        for anchor in anchors {
            store.add(&anchor.url, anchor.key_bytes()?)?;
        }
        Ok(store)
    }

    /// Trust `key` for proofs about the ledger at `url`, replacing any previous key
    pub fn add(&self, url: &str, key: [u8; 32]) -> Result<()> {
        let mut keys = self
            .keys
            .write()
            .map_err(|_| InteropError::Other("trust store lock poisoned".to_string()))?;
        match keys.insert(url.to_string(), key) {
            Some(previous) if previous != key => warn!(
                "replacing committer [{}] with [{}] for [{}]",
                hex::encode(&previous[..6]),
                hex::encode(&key[..6]),
                url
            ),
            _ => debug!("trusting committer [{}] for [{}]", hex::encode(&key[..6]), url),
        }
        Ok(())
    }
}

impl TrustAnchors for TrustStore {
    fn committer_key(&self, ledger_url: &str) -> Option<[u8; 32]> {
        self.keys.read().ok()?.get(ledger_url).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_trust_store() {
        let store = TrustStore::from_config(&[TrustAnchorConfig {
            url: "fabric://beta../".to_string(),
            committer_key: "02".repeat(32),
        }])
        .unwrap();
        assert_eq!(store.committer_key("fabric://beta../"), Some([2u8; 32]));
        assert_eq!(store.committer_key("fabric://alpha../"), None);

        store.add("fabric://beta../", [3u8; 32]).unwrap();
        assert_eq!(store.committer_key("fabric://beta../"), Some([3u8; 32]));
    }

    #[test]
    fn test_poisoned_store_refuses_keys() {
        let store = Arc::new(TrustStore::new());
        let poisoner = store.clone();
        let _ = thread::spawn(move || {
            let _keys = poisoner.keys.write().unwrap();
            panic!("poison the trust store");
        })
        .join();

        assert!(matches!(
            store.add("fabric://beta../", [3u8; 32]),
            Err(InteropError::Other(_))
        ));
        assert_eq!(store.committer_key("fabric://beta../"), None);
    }
}
