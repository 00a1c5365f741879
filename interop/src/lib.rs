//! Cross-ledger token interoperability
//!
//! This crate re-exports all the components of the interop system.

pub use interop_core::*;
pub use interop_pledge::*;
pub use interop_proofs::*;
pub use interop_state::*;
pub use interop_token::*;
