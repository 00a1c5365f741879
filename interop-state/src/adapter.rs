use chrono::{DateTime, Utc};
use interop_core::driver::TrustAnchors;
use interop_core::error::{InteropError, Result};
use interop_proofs::{ProofQuery, RelayProof};
use std::sync::Arc;

/// A decoded proof about the state of one ledger
pub trait LedgerProof: Send {
    /// The query the proof answers
    fn query(&self) -> &ProofQuery;

    /// Ledger time at which the state was evaluated
    fn evaluated_at(&self) -> DateTime<Utc>;

    /// Check that the proof comes from the committed history of the ledger
    fn verify(&self) -> Result<()>;

    /// The proven value at a key; `None` if the proof shows the key absent
    fn read_state(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>>;
}

/// Ledger-specific decoding of proofs.
///
/// Supporting a new kind of ledger only takes a new adapter; the semantic
/// checks of the verifier stay the same.
pub trait ProofAdapter: Send + Sync {
    fn decode(&self, raw: &[u8]) -> Result<Box<dyn LedgerProof>>;
}

/// Adapter for proofs signed by a ledger committer over a sparse Merkle state root
pub struct CommittedStateAdapter {
    ledger_url: String,
    anchors: Arc<dyn TrustAnchors>,
}

impl CommittedStateAdapter {
    pub fn new(ledger_url: &str, anchors: Arc<dyn TrustAnchors>) -> Self {
        CommittedStateAdapter {
            ledger_url: ledger_url.to_string(),
            anchors,
        }
    }
}

struct CommittedStateProof {
    proof: RelayProof,
    ledger_url: String,
    trusted_key: Option<[u8; 32]>,
}

impl LedgerProof for CommittedStateProof {
    fn query(&self) -> &ProofQuery {
        &self.proof.query
    }

    fn evaluated_at(&self) -> DateTime<Utc> {
        self.proof.header.timestamp
    }

    fn verify(&self) -> Result<()> {
        if self.proof.header.ledger != self.ledger_url {
            return Err(InteropError::InvalidProof(format!(
                "proof produced by [{}], expected [{}]",
                self.proof.header.ledger, self.ledger_url
            )));
        }
        let trusted_key = self.trusted_key.ok_or_else(|| {
            InteropError::InvalidProof(format!("no trust anchor for [{}]", self.ledger_url))
        })?;
        if self.proof.committer != trusted_key {
            return Err(InteropError::InvalidProof(format!(
                "proof signed by an untrusted committer for [{}]",
                self.ledger_url
            )));
        }
        self.proof.verify()?;
        self.proof.verify_checkpoint_link()
    }

    fn read_state(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.proof.read_state(namespace, key)?.map(|v| v.to_vec()))
    }
}

impl ProofAdapter for CommittedStateAdapter {
    fn decode(&self, raw: &[u8]) -> Result<Box<dyn LedgerProof>> {
        let proof = RelayProof::from_bytes(raw)?;
        Ok(Box::new(CommittedStateProof {
            proof,
            ledger_url: self.ledger_url.clone(),
            trusted_key: self.anchors.committer_key(&self.ledger_url),
        }))
    }
}
