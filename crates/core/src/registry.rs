use std::{collections::HashMap, fmt, sync::Arc};

use tracing::{info, warn};

use crate::{
    adapter::Adapter,
    error::{Result, StripeError},
};

/// Version string to adapter mapping
///
/// Populated through `&mut self` at startup, then shared read-only (typically
/// behind an `Arc`). There is no removal operation.
#[derive(Default, Clone)]
pub struct Registry {
    adapters: HashMap<String, Arc<dyn Adapter>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `adapter` under its version, returning the adapter it replaced
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) -> Option<Arc<dyn Adapter>> {
        let version = adapter.version().to_string();
        let displaced = self.adapters.insert(version.clone(), adapter);
        if displaced.is_some() {
            warn!(version = %version, "Replaced previously registered adapter");
        } else {
            info!(version = %version, "Registered adapter");
        }
        displaced
    }

    pub fn lookup(&self, version: &str) -> Result<Arc<dyn Adapter>> {
        self.adapters
            .get(version)
            .cloned()
            .ok_or_else(|| StripeError::NotRegistered(version.to_string()))
    }

    pub fn contains(&self, version: &str) -> bool {
        self.adapters.contains_key(version)
    }

    /// Registered versions, sorted
    pub fn versions(&self) -> Vec<&str> {
        let mut versions: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        versions.sort_unstable();
        versions
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("versions", &self.versions())
            .finish()
    }
}
