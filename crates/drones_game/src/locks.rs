//! Per-match critical sections.
//!
//! Mutations of one match run one at a time; mutations of different
//! matches never wait on each other. The registry lock is held only while
//! looking up or inserting an entry, never across an await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, instrument, trace, warn};

use crate::{MatchError, MatchId, PlayerId};

/// Default bound on waiting for a section.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

/// What a critical section protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum SectionKey {
    /// Move submission against one match.
    #[display("match {}", _0)]
    Match(MatchId),
    /// Match creation for an unordered pair of players.
    #[display("pair {}-{}", _0, _1)]
    Pair(PlayerId, PlayerId),
}

impl SectionKey {
    /// Key for creating a match between `a` and `b`, independent of order.
    pub fn pair(a: PlayerId, b: PlayerId) -> Self {
        Self::Pair(a.min(b), a.max(b))
    }
}

type Registry = Arc<Mutex<HashMap<SectionKey, Arc<AsyncMutex<()>>>>>;

/// Registry of per-key async locks with bounded acquisition.
#[derive(Debug, Clone)]
pub struct MatchLocks {
    registry: Registry,
    timeout: Duration,
}

impl MatchLocks {
    /// Creates a registry whose acquisitions give up after `timeout`.
    #[instrument]
    pub fn new(timeout: Duration) -> Self {
        debug!("Creating match lock registry");
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    /// Returns the acquisition timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Waits for exclusive access to `key`.
    ///
    /// The section is held until the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::Busy`] if the section is not obtained within
    /// the timeout, or [`MatchError::Internal`] if the registry is poisoned.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn acquire(&self, key: SectionKey) -> Result<SectionGuard, MatchError> {
        let section = {
            let mut registry = self
                .registry
                .lock()
                .map_err(|_| MatchError::internal("Lock registry poisoned"))?;
            registry.entry(key).or_default().clone()
        };

        match tokio::time::timeout(self.timeout, section.lock_owned()).await {
            Ok(guard) => {
                trace!("Section entered");
                Ok(SectionGuard {
                    key,
                    registry: self.registry.clone(),
                    guard: Some(guard),
                })
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Section busy, giving up");
                prune(&self.registry, key, 1);
                Err(MatchError::busy(format!(
                    "{} is being modified by another request, try again",
                    key
                )))
            }
        }
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.registry.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl Default for MatchLocks {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

/// Removes `key` if nobody beyond `owners` references its lock.
fn prune(registry: &Registry, key: SectionKey, owners: usize) {
    let Ok(mut registry) = registry.lock() else {
        return;
    };
    if registry
        .get(&key)
        .is_some_and(|section| Arc::strong_count(section) <= owners)
    {
        registry.remove(&key);
    }
}

/// Exclusive access to one section. Released on drop.
#[derive(Debug)]
pub struct SectionGuard {
    key: SectionKey,
    registry: Registry,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SectionGuard {
    /// The key this guard holds.
    pub fn key(&self) -> SectionKey {
        self.key
    }
}

impl Drop for SectionGuard {
    fn drop(&mut self) {
        // The registry entry plus this guard; anything more is a waiter.
        prune(&self.registry, self.key, 2);
        self.guard.take();
        trace!(key = %self.key, "Section released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_unordered() {
        assert_eq!(SectionKey::pair(3, 8), SectionKey::pair(8, 3));
        assert_ne!(SectionKey::pair(3, 8), SectionKey::Match(3));
    }

    #[tokio::test]
    async fn test_same_key_times_out_as_busy() {
        let locks = MatchLocks::new(Duration::from_millis(50));
        let _held = locks.acquire(SectionKey::Match(1)).await.unwrap();

        let err = locks.acquire(SectionKey::Match(1)).await.unwrap_err();
        assert!(matches!(err, MatchError::Busy(_)));
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = MatchLocks::new(Duration::from_millis(50));
        let _one = locks.acquire(SectionKey::Match(1)).await.unwrap();
        let two = locks.acquire(SectionKey::Match(2)).await;
        assert!(two.is_ok());
    }

    #[tokio::test]
    async fn test_release_on_drop_allows_reentry() {
        let locks = MatchLocks::new(Duration::from_millis(50));
        {
            let _held = locks.acquire(SectionKey::Match(1)).await.unwrap();
        }
        assert!(locks.acquire(SectionKey::Match(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = MatchLocks::default();
        let a = locks.acquire(SectionKey::Match(1)).await.unwrap();
        let b = locks.acquire(SectionKey::Match(2)).await.unwrap();
        assert_eq!(locks.tracked(), 2);
        drop(a);
        drop(b);
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_waiter_gets_section_after_release() {
        let locks = MatchLocks::new(Duration::from_secs(2));
        let held = locks.acquire(SectionKey::Match(7)).await.unwrap();

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire(SectionKey::Match(7)).await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);

        assert!(waiter.await.unwrap().is_ok());
    }
}
