//! Explicit composition point mapping driver names to factories.
//!
//! The host application builds a registry at startup, registers the drivers
//! it ships, and creates the configured one by name. Nothing is registered
//! implicitly.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::DriverError;
use crate::storage::StorageDriver;

/// Builds a ready-to-initialise driver.
pub type DriverFactory =
    Box<dyn Fn() -> Result<Box<dyn StorageDriver>, DriverError> + Send + Sync>;

/// Named driver factories.
#[derive(Default)]
pub struct DriverRegistry {
    factories: BTreeMap<String, DriverFactory>,
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}

impl DriverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Config`] when `name` is blank or already taken.
    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<(), DriverError>
    where
        F: Fn() -> Result<Box<dyn StorageDriver>, DriverError> + Send + Sync + 'static,
    {
        let key = name.trim();
        if key.is_empty() {
            return Err(DriverError::Config(String::from(
                "driver name must not be empty",
            )));
        }
        if self.factories.contains_key(key) {
            return Err(DriverError::Config(format!(
                "storage driver {key} is already registered"
            )));
        }
        self.factories.insert(key.to_owned(), Box::new(factory));
        Ok(())
    }

    /// Registered driver names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Builds the driver registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Config`] when no driver has that name, or
    /// whatever the factory reports.
    pub fn create(&self, name: &str) -> Result<Box<dyn StorageDriver>, DriverError> {
        let factory = self.factories.get(name.trim()).ok_or_else(|| {
            DriverError::Config(format!(
                "unknown storage driver {name}; available: {}",
                self.names().join(", ")
            ))
        })?;
        factory()
    }
}
