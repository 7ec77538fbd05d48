//! Name → factory lookup for motor drivers.
//!
//! Built once at startup and handed to whatever picks the driver from
//! `[driver] name`. There is no global registry.

use halo_common::hal::driver::{DriverFactory, HalError, MotorDriver};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tracing::debug;

/// Registered driver factories, ordered by name.
#[derive(Default)]
pub struct DriverRegistry {
    factories: BTreeMap<&'static str, DriverFactory>,
}

impl DriverRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the simulation and VESC drivers.
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::new();
        crate::drivers::register_all_drivers(&mut registry);
        registry
    }

    /// Add a factory under `name`.
    ///
    /// # Errors
    /// `HalError::DuplicateDriver` if `name` is taken; the existing factory
    /// is kept.
    pub fn register(&mut self, name: &'static str, factory: DriverFactory) -> Result<(), HalError> {
        match self.factories.entry(name) {
            Entry::Occupied(_) => Err(HalError::DuplicateDriver(name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(factory);
                debug!(driver = name, "Registered driver");
                Ok(())
            }
        }
    }

    /// Whether a driver is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build an uninitialized driver.
    ///
    /// # Errors
    /// `HalError::DriverNotFound` for an unknown name.
    pub fn create_driver(&self, name: &str) -> Result<Box<dyn MotorDriver>, HalError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| HalError::DriverNotFound(name.to_string()))
    }

    /// Registered names in order.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}
