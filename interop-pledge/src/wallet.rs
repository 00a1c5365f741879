use interop_core::action::AuditInfo;
use interop_core::driver::AuditInfoProvider;
use interop_core::error::Result;
use interop_core::id::Identity;
use std::collections::HashMap;
use std::sync::RwLock;

/// Identities of the parties hosted by this node, with their enrollment ids
#[derive(Debug, Default)]
pub struct WalletManager {
    enrollments: RwLock<HashMap<Identity, String>>,
}

impl WalletManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the wallet of a named party and return its identity
    pub fn register(&self, label: &str) -> Identity {
        let identity = Identity::from_label(label);
        if let Ok(mut enrollments) = self.enrollments.write() {
            enrollments.insert(identity.clone(), label.to_string());
        }
        identity
    }
}

impl AuditInfoProvider for WalletManager {
    /// Unknown identities disclose an empty enrollment id
    fn audit_info(&self, identity: &Identity) -> Result<Vec<u8>> {
        let enrollment_id = self
            .enrollments
            .read()
            .ok()
            .and_then(|e| e.get(identity).cloned())
            .unwrap_or_default();
        AuditInfo {
            identity: identity.clone(),
            enrollment_id,
        }
        .to_bytes()
    }

    fn is_local(&self, identity: &Identity) -> bool {
        self.enrollments
            .read()
            .map(|e| e.contains_key(identity))
            .unwrap_or(false)
    }
}
