//! Client-local key/value store collaborator

use std::collections::HashMap;

use parking_lot::RwLock;

/// Persistent client-local key/value store, scoped per client context.
///
/// Stands in for whatever storage the client platform provides. All
/// operations are synchronous and non-blocking.
pub trait ClientStore: Send + Sync {
    fn get(&self, client: &str, key: &str) -> Option<String>;

    fn set(&self, client: &str, key: &str, value: String);

    /// Returns whether a value was present
    fn remove(&self, client: &str, key: &str) -> bool;
}

/// Thread-safe in-memory store
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("client_count", &self.entries.read().len())
            .finish()
    }
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientStore for InMemoryStore {
    fn get(&self, client: &str, key: &str) -> Option<String> {
        self.entries
            .read()
            .get(client)
            .and_then(|scope| scope.get(key))
            .cloned()
    }

    fn set(&self, client: &str, key: &str, value: String) {
        self.entries
            .write()
            .entry(client.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    fn remove(&self, client: &str, key: &str) -> bool {
        self.entries
            .write()
            .get_mut(client)
            .is_some_and(|scope| scope.remove(key).is_some())
    }
}
