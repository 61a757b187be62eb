use async_trait::async_trait;
use intent_settle_types::{Intent, IntentId, IntentStatus};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════
// STORE TRAIT
// ═══════════════════════════════════════════════════════════════════════════

/// Persistence for intent records.
///
/// Implementations only store and load; lifecycle rules live in
/// [`IntentRecord`](crate::IntentRecord).
#[async_trait]
pub trait IntentStore: Send + Sync {
    /// Insert a new intent. Fails with `DuplicateId` if the id exists.
    async fn insert(&self, intent: &Intent) -> Result<(), StoreError>;

    async fn get(&self, id: &IntentId) -> Result<Option<Intent>, StoreError>;

    /// Replace a stored intent. Fails with `NotFound` if it was never inserted.
    async fn update(&self, intent: &Intent) -> Result<(), StoreError>;

    /// Intents in `status`, oldest first.
    async fn list_by_status(
        &self,
        status: IntentStatus,
        limit: usize,
    ) -> Result<Vec<Intent>, StoreError>;

    /// All intents, oldest first.
    async fn list(&self, limit: usize) -> Result<Vec<Intent>, StoreError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("intent not found: {0}")]
    NotFound(String),

    #[error("duplicate intent id: {0}")]
    DuplicateId(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("connection error: {0}")]
    ConnectionError(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::SerializationError(err.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// IN-MEMORY IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════

/// In-memory store for tests and the simulated service.
///
/// The lock is never held across an await point.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    intents: Arc<RwLock<HashMap<IntentId, Intent>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<IntentId, Intent>>, StoreError> {
        self.intents
            .read()
            .map_err(|e| StoreError::DatabaseError(format!("lock poisoned: {e}")))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<IntentId, Intent>>, StoreError> {
        self.intents
            .write()
            .map_err(|e| StoreError::DatabaseError(format!("lock poisoned: {e}")))
    }
}

fn oldest_first(mut intents: Vec<Intent>, limit: usize) -> Vec<Intent> {
    intents.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    intents.truncate(limit);
    intents
}

#[async_trait]
impl IntentStore for InMemoryStore {
    async fn insert(&self, intent: &Intent) -> Result<(), StoreError> {
        let mut intents = self.write()?;
        if intents.contains_key(&intent.id) {
            return Err(StoreError::DuplicateId(intent.id.to_string()));
        }
        intents.insert(intent.id.clone(), intent.clone());
        Ok(())
    }

    async fn get(&self, id: &IntentId) -> Result<Option<Intent>, StoreError> {
        Ok(self.read()?.get(id).cloned())
    }

    async fn update(&self, intent: &Intent) -> Result<(), StoreError> {
        let mut intents = self.write()?;
        match intents.get_mut(&intent.id) {
            Some(existing) => {
                *existing = intent.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(intent.id.to_string())),
        }
    }

    async fn list_by_status(
        &self,
        status: IntentStatus,
        limit: usize,
    ) -> Result<Vec<Intent>, StoreError> {
        let matching = self
            .read()?
            .values()
            .filter(|i| i.status == status)
            .cloned()
            .collect();
        Ok(oldest_first(matching, limit))
    }

    async fn list(&self, limit: usize) -> Result<Vec<Intent>, StoreError> {
        let all = self.read()?.values().cloned().collect();
        Ok(oldest_first(all, limit))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use intent_settle_types::{Direction, NewIntent, Uint256};

    fn create_test_intent(id: &str, created_at: u64) -> Intent {
        Intent::from_request(
            IntentId::from(id),
            NewIntent::swap("base", Direction::Sell, "WBTC", "DAI", Uint256::from(100u128)),
            created_at,
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryStore::new();
        let intent = create_test_intent("intent-1", 100);

        store.insert(&intent).await.unwrap();

        let retrieved = store.get(&IntentId::from("intent-1")).await.unwrap();
        assert_eq!(retrieved, Some(intent));
    }

    #[tokio::test]
    async fn test_duplicate_id_error() {
        let store = InMemoryStore::new();
        let intent = create_test_intent("intent-1", 100);

        store.insert(&intent).await.unwrap();
        let result = store.insert(&intent).await;

        assert!(matches!(result, Err(StoreError::DuplicateId(_))));
    }

    #[tokio::test]
    async fn test_update_unknown_intent() {
        let store = InMemoryStore::new();
        let intent = create_test_intent("ghost", 100);

        assert!(matches!(
            store.update(&intent).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let store = InMemoryStore::new();

        let i1 = create_test_intent("intent-1", 300);
        let mut i2 = create_test_intent("intent-2", 200);
        i2.status = IntentStatus::Completed;
        let i3 = create_test_intent("intent-3", 100);

        store.insert(&i1).await.unwrap();
        store.insert(&i2).await.unwrap();
        store.insert(&i3).await.unwrap();

        let created = store.list_by_status(IntentStatus::Created, 10).await.unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].id.as_str(), "intent-3");

        let completed = store
            .list_by_status(IntentStatus::Completed, 10)
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);

        let limited = store.list(2).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].id.as_str(), "intent-3");
        assert_eq!(limited[1].id.as_str(), "intent-2");
    }
}
