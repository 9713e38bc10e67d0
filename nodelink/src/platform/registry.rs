//! Process-wide table of platform definitions.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use super::definition::PlatformDefinition;
use super::vendors;
use crate::error::{Error, Result};

static REGISTRY: Lazy<RwLock<PlatformRegistry>> = Lazy::new(|| RwLock::new(PlatformRegistry::with_builtins()));

#[derive(Debug, Default)]
pub struct PlatformRegistry {
    platforms: HashMap<String, PlatformDefinition>,
}

impl PlatformRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the bundled NX-OS and IOS XR definitions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for platform in [vendors::nxos::platform(), vendors::iosxr::platform()] {
            registry.platforms.insert(platform.name.clone(), platform);
        }
        registry
    }

    /// The process-wide registry, seeded with the bundled platforms.
    pub fn global() -> &'static RwLock<PlatformRegistry> {
        &REGISTRY
    }

    /// Clone a definition out of the global registry.
    pub fn lookup(name: &str) -> Result<PlatformDefinition> {
        let registry = REGISTRY.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        registry
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Config(format!("unknown platform '{name}'")))
    }

    /// Add a platform. Names must be unique.
    pub fn register(&mut self, platform: PlatformDefinition) -> Result<()> {
        if self.platforms.contains_key(&platform.name) {
            return Err(Error::Config(format!(
                "platform '{}' is already registered",
                platform.name
            )));
        }
        self.platforms.insert(platform.name.clone(), platform);
        Ok(())
    }

    /// Borrow a definition by name.
    pub fn get(&self, name: &str) -> Option<&PlatformDefinition> {
        self.platforms.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.platforms.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins() {
        let registry = PlatformRegistry::with_builtins();
        let mut names: Vec<_> = registry.names().collect();
        names.sort();
        assert_eq!(names, ["cisco_iosxr", "cisco_nxos"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = PlatformRegistry::with_builtins();
        let err = registry.register(vendors::nxos::platform()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(registry.register(PlatformDefinition::new("custom", "custom")).is_ok());
    }

    #[test]
    fn test_lookup() {
        assert_eq!(PlatformRegistry::lookup("cisco_nxos").unwrap().tag, "nexus");
        assert!(matches!(PlatformRegistry::lookup("vax_vms"), Err(Error::Config(_))));
    }
}
