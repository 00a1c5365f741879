pub mod common;
pub mod drivers;
pub mod fabtoken;
pub mod zkatdlog;

// Re-export the main types for convenience
pub use drivers::{default_registry, public_parameters_from_config};
pub use fabtoken::{FabtokenDriver, FabtokenPublicParams, FABTOKEN};
pub use zkatdlog::{ZkatdlogDriver, ZkatdlogPublicParams, ZKATDLOG};
