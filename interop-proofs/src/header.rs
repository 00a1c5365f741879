use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Header of a committed block, or of a checkpoint taken at query time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Url of the ledger that produced the header
    pub ledger: String,

    /// Number of blocks committed when the header was produced
    pub height: u64,

    /// Ledger time at which the state was evaluated
    pub timestamp: DateTime<Utc>,

    /// Root of the state Merkle tree
    pub state_root: [u8; 32],

    /// Hash of the previous block header, if any
    pub prev_hash: Option<[u8; 32]>,
}

impl BlockHeader {
    /// Computes the hash of this header
    /// Used to link headers in a chain
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.ledger.as_bytes());
        hasher.update(self.height.to_le_bytes());
        hasher.update(self.timestamp.timestamp().to_le_bytes());
        hasher.update(self.timestamp.timestamp_subsec_nanos().to_le_bytes());
        hasher.update(self.state_root);

        if let Some(prev_hash) = self.prev_hash {
            hasher.update(prev_hash);
        }

        hasher.finalize().into()
    }
}

/// Represents the result of verifying a header chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    /// The chain is valid
    Valid,

    /// The chain is invalid for the specified reason
    Invalid(String),

    /// Missing data needed to complete verification
    MissingData(String),
}

/// Verify that headers are linked, consecutive and never go back in time
pub fn verify_header_chain(headers: &[BlockHeader]) -> VerificationResult {
    if headers.is_empty() {
        return VerificationResult::MissingData("no headers".to_string());
    }

    for pair in headers.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.ledger != prev.ledger {
            return VerificationResult::Invalid(format!(
                "header {} belongs to [{}], expected [{}]",
                next.height, next.ledger, prev.ledger
            ));
        }
        if next.height != prev.height + 1 {
            return VerificationResult::Invalid(format!(
                "height {} does not follow {}",
                next.height, prev.height
            ));
        }
        if next.prev_hash != Some(prev.hash()) {
            return VerificationResult::Invalid(format!("header {} is not linked to its parent", next.height));
        }
        if next.timestamp < prev.timestamp {
            return VerificationResult::Invalid(format!("header {} goes back in time", next.height));
        }
    }

    VerificationResult::Valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn chain(len: u64) -> Vec<BlockHeader> {
        let start = Utc::now();
        let mut headers: Vec<BlockHeader> = Vec::new();
        for height in 1..=len {
            let prev_hash = headers.last().map(|h| h.hash());
            headers.push(BlockHeader {
                ledger: "fabric://alpha../".to_string(),
                height,
                timestamp: start + Duration::seconds(height as i64),
                state_root: [height as u8; 32],
                prev_hash,
            });
        }
        headers
    }

    #[test]
    fn test_valid_chain() {
        assert_eq!(verify_header_chain(&chain(4)), VerificationResult::Valid);
        assert!(matches!(verify_header_chain(&[]), VerificationResult::MissingData(_)));
    }

    #[test]
    fn test_broken_chain() {
        let mut headers = chain(3);
        headers[2].prev_hash = Some([9u8; 32]);
        assert!(matches!(verify_header_chain(&headers), VerificationResult::Invalid(_)));

        let mut headers = chain(3);
        headers[1].state_root = [7u8; 32];
        assert!(matches!(verify_header_chain(&headers), VerificationResult::Invalid(_)));

        let mut headers = chain(2);
        headers.swap(0, 1);
        assert!(matches!(verify_header_chain(&headers), VerificationResult::Invalid(_)));
    }
}
