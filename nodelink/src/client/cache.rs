//! Response cache shared by all drivers.

use std::collections::HashMap;

use log::trace;

use super::Output;

/// Partition of the cache a response belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Acknowledgement text returned by a configuration request.
    Config,
    /// Raw text show output.
    ShowText,
    /// Structured show output.
    ShowStructured,
    /// YANG-modelled configuration retrieval.
    Yang,
}

/// Per-client cache keyed by request kind and literal command text.
///
/// Entries are only ever dropped all at once. Empty output is never stored.
#[derive(Debug)]
pub struct ResponseCache {
    enabled: bool,
    auto_flush: bool,
    entries: HashMap<(RequestKind, String), Output>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_flush: true,
            entries: HashMap::new(),
        }
    }
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable caching. Disabling drops every entry.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.flush();
        }
    }

    pub fn auto_flush(&self) -> bool {
        self.auto_flush
    }

    pub fn set_auto_flush(&mut self, auto_flush: bool) {
        self.auto_flush = auto_flush;
    }

    /// Drop every entry.
    pub fn flush(&mut self) {
        if !self.entries.is_empty() {
            trace!("cache: flushing {} entries", self.entries.len());
        }
        self.entries.clear();
    }

    /// Look up a previous response.
    pub fn lookup(&self, kind: RequestKind, command: &str) -> Option<&Output> {
        if !self.enabled {
            return None;
        }
        let hit = self.entries.get(&(kind, command.to_string()));
        if hit.is_some() {
            trace!("cache: hit for {:?} '{}'", kind, command);
        }
        hit
    }

    /// Record a response. Ignored when disabled or when `output` is empty.
    pub fn store(&mut self, kind: RequestKind, command: &str, output: &Output) {
        if !self.enabled || output.is_empty() {
            return;
        }
        self.entries
            .insert((kind, command.to_string()), output.clone());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_lookup() {
        let mut cache = ResponseCache::new();
        cache.store(RequestKind::ShowText, "show hostname", &Output::Text("n9k".into()));
        assert_eq!(
            cache.lookup(RequestKind::ShowText, "show hostname"),
            Some(&Output::Text("n9k".into()))
        );
        assert!(cache.lookup(RequestKind::ShowStructured, "show hostname").is_none());
    }

    #[test]
    fn test_empty_output_not_stored() {
        let mut cache = ResponseCache::new();
        cache.store(RequestKind::ShowText, "show run | i foo", &Output::Empty);
        cache.store(RequestKind::ShowText, "show run | i bar", &Output::Text(String::new()));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_disable_flushes() {
        let mut cache = ResponseCache::new();
        cache.store(RequestKind::ShowText, "show clock", &Output::Text("12:00".into()));
        cache.set_enabled(false);
        assert!(cache.is_empty());
        cache.store(RequestKind::ShowText, "show clock", &Output::Text("12:00".into()));
        assert!(cache.is_empty());

        cache.set_enabled(true);
        assert!(cache.is_empty());
    }
}
