pub mod action;
pub mod config;
pub mod driver;
pub mod error;
pub mod id;
pub mod ledger_url;
pub mod quantity;
pub mod registry;
pub mod token;

// Re-export the main types for convenience
pub use action::{
    AuditInfo, ClaimLinkage, IssueMetadata, IssueOptions, ScriptAuditInfo, TokenRequest,
    TokenRequestMetadata, TransferMetadata, TransferOptions,
};
pub use config::{InteropConfig, ScanConfig, TmsConfig, TrustAnchorConfig};
pub use driver::{
    AuditInfoProvider, Driver, LedgerQuery, LedgerReader, LoadedToken, PledgeInfo, PledgeVault,
    PublicParameters, Relay, RelayResponse, SerializedPublicParameters, StateEnv,
    StateQueryExecutor, StateUpdate, StateVerifier, TokenLoader, TokenService, TrustAnchors,
    Validator,
};
pub use error::{ErrorKind, InteropError, MismatchField, Result};
pub use id::{Identity, PledgeId, TokenId, TxId};
pub use quantity::Quantity;
pub use registry::{DriverRegistry, DriverRegistryBuilder};
pub use token::{HashFunction, HtlcScript, Owner, PledgeScript, Token, UnspentToken};
pub use ledger_url::{LedgerUrl, TmsId};
