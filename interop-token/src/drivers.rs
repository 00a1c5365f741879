//! Wiring of the built-in schemes.

use crate::fabtoken::{FabtokenDriver, FABTOKEN};
use crate::zkatdlog::{ZkatdlogDriver, ZKATDLOG};
use interop_core::config::TmsConfig;
use interop_core::driver::PublicParameters;
use interop_core::error::Result;
use interop_core::registry::DriverRegistry;
use std::sync::Arc;

/// Registry holding the plaintext and the committed-quantity drivers
pub fn default_registry() -> DriverRegistry {
    DriverRegistry::builder()
        .register(FABTOKEN, Arc::new(FabtokenDriver))
        .register(ZKATDLOG, Arc::new(ZkatdlogDriver::default()))
        .build()
}

/// Fresh public parameters for a configured token scope, built by the driver
/// the scope names
pub fn public_parameters_from_config(
    registry: &DriverRegistry,
    config: &TmsConfig,
) -> Result<Arc<dyn PublicParameters>> {
    registry.lookup(&config.driver)?.new_public_parameters(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use interop_core::driver::SerializedPublicParameters;
    use interop_core::error::InteropError;
    use interop_core::ledger_url::TmsId;

    fn config(driver: &str, precision: u32) -> TmsConfig {
        TmsConfig {
            id: TmsId::network("alpha"),
            driver: driver.to_string(),
            precision,
            issuers: vec!["issuer".to_string()],
            auditors: vec![],
        }
    }

    #[test]
    fn test_parameters_resolve_through_registry() {
        let registry = default_registry();
        for driver in [FABTOKEN, ZKATDLOG] {
            let pp = public_parameters_from_config(&registry, &config(driver, 32)).unwrap();
            let envelope = SerializedPublicParameters::from_bytes(&pp.to_envelope().unwrap()).unwrap();
            assert_eq!(envelope.identifier, driver);

            let parsed = registry
                .lookup(&envelope.identifier)
                .unwrap()
                .parse_public_parameters(&envelope.raw)
                .unwrap();
            assert_eq!(parsed.identifier(), driver);
            assert_eq!(parsed.precision(), 32);
            assert_eq!(parsed.issuers(), pp.issuers());
        }
    }

    #[test]
    fn test_parameters_built_by_registered_driver() {
        let registry = DriverRegistry::builder()
            .register("plain", Arc::new(FabtokenDriver))
            .build();
        let pp = public_parameters_from_config(&registry, &config("plain", 16)).unwrap();
        assert_eq!(pp.identifier(), FABTOKEN);
        assert_eq!(pp.precision(), 16);

        // Built-in names are not special without a registration
        assert!(matches!(
            public_parameters_from_config(&registry, &config(FABTOKEN, 16)),
            Err(InteropError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_unknown_driver() {
        assert!(matches!(
            public_parameters_from_config(&default_registry(), &config("dlog", 64)),
            Err(InteropError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            default_registry().lookup("dlog"),
            Err(InteropError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_zkatdlog_precision_bound() {
        assert!(matches!(
            public_parameters_from_config(&default_registry(), &config(ZKATDLOG, 65)),
            Err(InteropError::InvalidPrecision(65))
        ));
    }
}
