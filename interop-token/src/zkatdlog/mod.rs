//! Committed-quantity token scheme: output values are hidden in Pedersen
//! commitments, every output carries a range proof, transfers carry one
//! balance proof per token type and the auditor receives the openings
//! off-ledger.

pub mod actions;
pub mod driver;
pub mod params;
pub mod pedersen;
pub mod range;
pub mod service;
pub mod validator;

pub use driver::ZkatdlogDriver;
pub use params::{ZkatdlogPublicParams, MAX_ZK_PRECISION, ZKATDLOG};
pub use service::ZkatdlogService;
pub use validator::ZkatdlogValidator;
