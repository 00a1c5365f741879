use crate::header::{verify_header_chain, BlockHeader, VerificationResult};
use crate::merkle_proof::MerkleProof;
use crate::schnorr::{verify_signature, Signature, SigningKey};
use chrono::{DateTime, Utc};
use interop_core::error::{InteropError, Result};
use interop_core::id::TokenId;
use serde::{Deserialize, Serialize};

/// The question a relay proof answers, echoed inside the signed payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofQuery {
    PublicParameters,
    Existence {
        token_id: TokenId,
    },
    NonExistence {
        token_id: TokenId,
        origin: String,
        deadline: DateTime<Utc>,
    },
    MetadataExistence {
        token_id: TokenId,
        origin: String,
    },
}

/// One state entry read by the ledger, with its Merkle path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRead {
    pub namespace: String,
    pub key: String,
    pub value: Option<Vec<u8>>,
    pub path: MerkleProof,
}

/// Ledger-signed evidence about the state of a ledger at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayProof {
    /// Checkpoint taken at query time, one past the last sealed block
    pub header: BlockHeader,
    /// Last sealed block the checkpoint extends, `None` on an empty ledger
    pub parent: Option<BlockHeader>,
    pub query: ProofQuery,
    pub reads: Vec<StateRead>,
    /// Verifying key of the committer that signed the proof
    pub committer: [u8; 32],
    pub signature: Signature,
}

fn signing_payload(
    header: &BlockHeader,
    parent: Option<&BlockHeader>,
    query: &ProofQuery,
    reads: &[StateRead],
) -> Result<Vec<u8>> {
    Ok(bincode::serialize(&(header, parent, query, reads))?)
}

impl RelayProof {
    /// Sign a proof with the committer key of the ledger
    pub fn seal(
        header: BlockHeader,
        parent: Option<BlockHeader>,
        query: ProofQuery,
        reads: Vec<StateRead>,
        key: &SigningKey,
    ) -> Result<Self> {
        let signature = key.sign(&signing_payload(&header, parent.as_ref(), &query, &reads)?);
        Ok(RelayProof {
            header,
            parent,
            query,
            reads,
            committer: key.verifying_key(),
            signature,
        })
    }

    /// Check the signature and that every read is committed under the header's state root.
    ///
    /// Whether the committer is trusted for the ledger is up to the caller.
    pub fn verify(&self) -> Result<()> {
        let payload = signing_payload(&self.header, self.parent.as_ref(), &self.query, &self.reads)?;
        if !verify_signature(&self.committer, &payload, &self.signature) {
            return Err(InteropError::InvalidProof("invalid committer signature".to_string()));
        }

        for read in &self.reads {
            if !read.path.proves(&read.namespace, &read.key, read.value.as_deref()) {
                return Err(InteropError::InvalidProof(format!(
                    "path does not match the value read at [{}]",
                    read.key.escape_debug()
                )));
            }
            if !read.path.verify(&self.header.state_root) {
                return Err(InteropError::InvalidProof(format!(
                    "read at [{}] is not committed under the state root",
                    read.key.escape_debug()
                )));
            }
        }

        Ok(())
    }

    /// Check that the checkpoint directly extends the sealed block it names
    pub fn verify_checkpoint_link(&self) -> Result<()> {
        match &self.parent {
            Some(parent) => match verify_header_chain(&[parent.clone(), self.header.clone()]) {
                VerificationResult::Valid => Ok(()),
                VerificationResult::Invalid(reason) | VerificationResult::MissingData(reason) => Err(
                    InteropError::InvalidProof(format!("checkpoint does not extend the ledger: {}", reason)),
                ),
            },
            None if self.header.height == 1 && self.header.prev_hash.is_none() => Ok(()),
            None => Err(InteropError::InvalidProof(format!(
                "checkpoint at height {} without its parent block",
                self.header.height
            ))),
        }
    }

    /// The value the proof reports at a key; fails if the key was not read
    pub fn read_state(&self, namespace: &str, key: &str) -> Result<Option<&[u8]>> {
        self.reads
            .iter()
            .find(|r| r.namespace == namespace && r.key == key)
            .map(|r| r.value.as_deref())
            .ok_or_else(|| InteropError::InvalidProof(format!("key [{}] not covered by proof", key.escape_debug())))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        bincode::deserialize(raw).map_err(|e| InteropError::InvalidProof(format!("malformed proof: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle_proof::MerkleTree;
    use interop_core::id::TxId;

    fn genesis() -> BlockHeader {
        BlockHeader {
            ledger: "fabric://alpha../".to_string(),
            height: 1,
            timestamp: Utc::now(),
            state_root: [0u8; 32],
            prev_hash: None,
        }
    }

    fn proof_over(tree: &MerkleTree, key: &SigningKey, entries: &[(&str, Option<&[u8]>)]) -> RelayProof {
        let parent = genesis();
        let header = BlockHeader {
            ledger: parent.ledger.clone(),
            height: 2,
            timestamp: parent.timestamp,
            state_root: tree.root_hash(),
            prev_hash: Some(parent.hash()),
        };
        let reads = entries
            .iter()
            .map(|(k, v)| StateRead {
                namespace: "ns".to_string(),
                key: k.to_string(),
                value: v.map(|v| v.to_vec()),
                path: tree.generate_proof("ns", k),
            })
            .collect();
        let query = ProofQuery::Existence {
            token_id: TokenId::new(TxId::new("tx"), 0),
        };
        RelayProof::seal(header, Some(parent), query, reads, key).unwrap()
    }

    #[test]
    fn test_sealed_proof_verifies() {
        let mut tree = MerkleTree::new();
        tree.insert("ns", "a", b"1");
        let key = SigningKey::from_seed(b"alpha");
        let proof = proof_over(&tree, &key, &[("a", Some(&b"1"[..])), ("b", None)]);

        let decoded = RelayProof::from_bytes(&proof.to_bytes().unwrap()).unwrap();
        decoded.verify().unwrap();
        decoded.verify_checkpoint_link().unwrap();
        assert_eq!(decoded.committer, key.verifying_key());
        assert_eq!(decoded.read_state("ns", "a").unwrap(), Some(&b"1"[..]));
        assert_eq!(decoded.read_state("ns", "b").unwrap(), None);
        assert!(decoded.read_state("ns", "c").is_err());
    }

    #[test]
    fn test_tampered_proof_is_rejected() {
        let mut tree = MerkleTree::new();
        tree.insert("ns", "a", b"1");
        let key = SigningKey::from_seed(b"alpha");

        // Claiming a value the tree does not hold
        let forged = proof_over(&tree, &key, &[("a", Some(&b"2"[..]))]);
        assert!(matches!(forged.verify(), Err(InteropError::InvalidProof(_))));

        // Changing the signed payload after sealing
        let mut proof = proof_over(&tree, &key, &[("a", Some(&b"1"[..]))]);
        proof.header.height = 3;
        assert!(matches!(proof.verify(), Err(InteropError::InvalidProof(_))));

        assert!(RelayProof::from_bytes(b"garbage").is_err());
    }

    #[test]
    fn test_checkpoint_must_extend_parent() {
        let mut tree = MerkleTree::new();
        tree.insert("ns", "a", b"1");
        let key = SigningKey::from_seed(b"alpha");
        let reads = |proof: &RelayProof| proof.reads.clone();
        let sealed = proof_over(&tree, &key, &[("a", Some(&b"1"[..]))]);

        // Same height as the parent it names
        let mut header = sealed.header.clone();
        header.height = 1;
        let stale = RelayProof::seal(header, sealed.parent.clone(), sealed.query.clone(), reads(&sealed), &key).unwrap();
        stale.verify().unwrap();
        assert!(matches!(stale.verify_checkpoint_link(), Err(InteropError::InvalidProof(_))));

        // Linked to a block other than the parent
        let mut header = sealed.header.clone();
        header.prev_hash = Some([3u8; 32]);
        let unlinked =
            RelayProof::seal(header, sealed.parent.clone(), sealed.query.clone(), reads(&sealed), &key).unwrap();
        assert!(unlinked.verify_checkpoint_link().is_err());

        // A later checkpoint must carry its parent
        let orphan = RelayProof::seal(sealed.header.clone(), None, sealed.query.clone(), reads(&sealed), &key).unwrap();
        assert!(orphan.verify_checkpoint_link().is_err());

        let mut first = sealed.header.clone();
        first.height = 1;
        first.prev_hash = None;
        let empty_ledger = RelayProof::seal(first, None, sealed.query.clone(), reads(&sealed), &key).unwrap();
        empty_ledger.verify_checkpoint_link().unwrap();
    }
}
