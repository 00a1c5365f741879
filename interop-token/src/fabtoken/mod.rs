//! Plaintext token scheme: outputs are tokens in clear and value
//! conservation is checked on the quantities themselves.

pub mod actions;
pub mod driver;
pub mod params;
pub mod service;
pub mod validator;

pub use driver::FabtokenDriver;
pub use params::{FabtokenPublicParams, FABTOKEN};
pub use service::FabtokenService;
pub use validator::FabtokenValidator;
