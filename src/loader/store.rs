// Completed payload storage

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Payloads of successfully loaded resources, keyed by resource id
///
/// Written only by the session driver; readers get cheap shared slices.
#[derive(Debug, Default)]
pub struct ResourceStore {
    payloads: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a payload, replacing any previous one for the same id
    pub fn insert(&self, id: &str, bytes: Vec<u8>) -> Arc<[u8]> {
        let payload: Arc<[u8]> = Arc::from(bytes);
        self.payloads
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), payload.clone());
        payload
    }

    /// Get a payload by resource id
    pub fn get(&self, id: &str) -> Option<Arc<[u8]>> {
        self.payloads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Check if a payload exists
    pub fn contains(&self, id: &str) -> bool {
        self.payloads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Drop every stored payload
    pub fn clear(&self) {
        self.payloads
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Get statistics about stored payloads
    pub fn stats(&self) -> StoreStats {
        let payloads = self.payloads.read().unwrap_or_else(PoisonError::into_inner);
        StoreStats {
            resource_count: payloads.len(),
            total_bytes: payloads.values().map(|p| p.len() as u64).sum(),
        }
    }
}

/// Statistics about stored payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub resource_count: usize,
    pub total_bytes: u64,
}
