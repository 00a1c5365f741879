use crate::driver::Driver;
use crate::error::{InteropError, Result};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

/// Collects drivers at process start.
///
/// Registering an empty name or the same name twice is a programming error
/// and panics.
#[derive(Default)]
pub struct DriverRegistryBuilder {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: &str, driver: Arc<dyn Driver>) -> Self {
        if name.is_empty() {
            panic!("Register driver name is empty");
        }
        if self.drivers.contains_key(name) {
            panic!("Register called twice for driver {}", name);
        }
        debug!("registering token driver [{}]", name);
        self.drivers.insert(name.to_string(), driver);
        self
    }

    pub fn build(self) -> DriverRegistry {
        DriverRegistry {
            drivers: self.drivers,
        }
    }
}

/// Immutable map from scheme identifier to driver
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn builder() -> DriverRegistryBuilder {
        DriverRegistryBuilder::new()
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Driver>> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| InteropError::UnsupportedScheme(name.to_string()))
    }

    /// Sorted names of the registered drivers
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.drivers.keys().cloned().collect();
        names.sort();
        names
    }
}
