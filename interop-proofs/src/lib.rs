pub mod header;
pub mod keys;
pub mod merkle_proof;
pub mod relay_proof;
pub mod schnorr;

// Re-export the main types for convenience
pub use header::{verify_header_chain, BlockHeader, VerificationResult};
pub use keys::PledgeOutcome;
pub use merkle_proof::{MerkleProof, MerkleTree};
pub use relay_proof::{ProofQuery, RelayProof, StateRead};
pub use schnorr::{Signature, SigningKey};
