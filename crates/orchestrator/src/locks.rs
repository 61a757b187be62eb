//! Per-network execution locks.
//!
//! Each network gets one FIFO slot guarding its account sequence. Callers
//! hold it from the sequence read until the node accepts the submission and
//! drop it before waiting for confirmation.

use intent_settle_types::NetworkId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("timed out after {waited:?} waiting for the {network} lock")]
    Timeout { network: NetworkId, waited: Duration },
}

pub struct NetworkLocks {
    slots: Mutex<HashMap<NetworkId, Arc<AsyncMutex<()>>>>,
    acquire_timeout: Duration,
}

impl NetworkLocks {
    pub fn new(acquire_timeout: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            acquire_timeout,
        }
    }

    /// Wait for the network's slot. Waiters are served in arrival order
    /// because the underlying tokio mutex is fair.
    pub async fn acquire(&self, network: &NetworkId) -> Result<NetworkLockGuard, LockError> {
        let slot = self.slot(network);
        let started = Instant::now();

        match tokio::time::timeout(self.acquire_timeout, slot.lock_owned()).await {
            Ok(guard) => {
                let waited = started.elapsed();
                debug!(network = %network, waited_ms = waited.as_millis() as u64, "Network lock acquired");
                Ok(NetworkLockGuard {
                    network: network.clone(),
                    waited,
                    acquired_at: Instant::now(),
                    _guard: guard,
                })
            }
            Err(_) => {
                warn!(network = %network, "Network lock acquisition timed out");
                Err(LockError::Timeout {
                    network: network.clone(),
                    waited: started.elapsed(),
                })
            }
        }
    }

    fn slot(&self, network: &NetworkId) -> Arc<AsyncMutex<()>> {
        // The map only ever gains entries, so a poisoned guard is still usable.
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .entry(network.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

/// Held slot for one network. Released on drop.
pub struct NetworkLockGuard {
    network: NetworkId,
    waited: Duration,
    acquired_at: Instant,
    _guard: OwnedMutexGuard<()>,
}

impl NetworkLockGuard {
    pub fn network(&self) -> &NetworkId {
        &self.network
    }

    /// Time spent queued before the slot was granted.
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

impl Drop for NetworkLockGuard {
    fn drop(&mut self) {
        debug!(
            network = %self.network,
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "Network lock released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex as AsyncMutex;

    #[tokio::test]
    async fn test_waiters_served_in_arrival_order() {
        let locks = Arc::new(NetworkLocks::new(Duration::from_secs(5)));
        let network = NetworkId::from("base");
        let order = Arc::new(AsyncMutex::new(Vec::new()));

        let first = locks.acquire(&network).await.unwrap();
        let mut handles = Vec::new();
        for i in 0..5 {
            let locks = locks.clone();
            let network = network.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(&network).await.unwrap();
                order.lock().await.push(i);
            }));
            // Let the task enqueue before spawning the next one.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        drop(first);

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_networks_do_not_block_each_other() {
        let locks = NetworkLocks::new(Duration::from_millis(50));
        let _base = locks.acquire(&NetworkId::from("base")).await.unwrap();
        let arbitrum = locks.acquire(&NetworkId::from("arbitrum")).await.unwrap();
        assert_eq!(arbitrum.network().as_str(), "arbitrum");
    }

    #[tokio::test]
    async fn test_acquire_times_out() {
        let locks = NetworkLocks::new(Duration::from_millis(20));
        let network = NetworkId::from("base");
        let _held = locks.acquire(&network).await.unwrap();

        let err = locks.acquire(&network).await.err().unwrap();
        assert!(matches!(err, LockError::Timeout { network: n, .. } if n == network));
    }

    #[tokio::test]
    async fn test_release_on_drop() {
        let locks = NetworkLocks::new(Duration::from_millis(20));
        let network = NetworkId::from("base");
        drop(locks.acquire(&network).await.unwrap());
        assert!(locks.acquire(&network).await.is_ok());
    }
}
