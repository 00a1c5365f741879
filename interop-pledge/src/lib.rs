//! Pledge, claim, reclaim and redeem of tokens between two ledgers.
//!
//! The ledgers, the relay and the wallets are in-process; proofs still go
//! through the relay and are checked against the committer keys of the
//! network's trust store.

pub mod clock;
pub mod ledger;
pub mod network;
pub mod protocol;
pub mod relay;
pub mod tms;
pub mod tokens;
pub mod vault;
pub mod wallet;

#[cfg(test)]
mod scenario_tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger::{CommittedTransaction, MockLedger};
pub use network::InteropNetwork;
pub use protocol::{fast_pledge_claim, fast_pledge_reclaim, FlowReceipt};
pub use relay::LocalRelay;
pub use tms::{Tms, TmsParts};
pub use tokens::{CreatedOutput, PledgedToken, TokenVault};
pub use vault::{FilePledgeVault, InMemoryPledgeVault};
pub use wallet::WalletManager;
