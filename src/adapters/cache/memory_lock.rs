//! In-process per-key lock service.
//!
//! Models the distributed lock's contract in one process: owner
//! tokens, TTL expiry (a crashed or stalled holder can be stolen),
//! and guaranteed release. The guard releases on drop as well, so a
//! timed-out execution that abandons its guard frees the key without
//! waiting out the TTL.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::ports::{DrawLockGuard, DrawLockService};

#[derive(Debug, Clone)]
struct LockEntry {
    owner: String,
    deadline: Instant,
}

type LockMap = Arc<Mutex<HashMap<String, LockEntry>>>;

#[derive(Default)]
pub struct MemoryLockService {
    locks: LockMap,
}

impl MemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }
}

const ACQUIRE_POLL: Duration = Duration::from_millis(10);

fn with_locks<T>(locks: &LockMap, f: impl FnOnce(&mut HashMap<String, LockEntry>) -> T) -> T {
    // The map mutex is only ever held for map operations; a poisoned
    // lock still carries usable state.
    let mut guard = match locks.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    f(&mut guard)
}

#[async_trait]
impl DrawLockService for MemoryLockService {
    async fn acquire(
        &self,
        key: &str,
        ttl: Duration,
        wait: Duration,
    ) -> DrawResult<Box<dyn DrawLockGuard>> {
        let owner = Uuid::new_v4().to_string();
        let give_up = Instant::now() + wait;

        loop {
            let acquired = with_locks(&self.locks, |locks| {
                let now = Instant::now();
                let free = match locks.get(key) {
                    None => true,
                    Some(entry) => entry.deadline <= now,
                };
                if free {
                    locks.insert(
                        key.to_string(),
                        LockEntry { owner: owner.clone(), deadline: now + ttl },
                    );
                }
                free
            });
            if acquired {
                return Ok(Box::new(MemoryLockGuard {
                    key: key.to_string(),
                    owner,
                    locks: Arc::clone(&self.locks),
                    released: false,
                }));
            }
            if Instant::now() >= give_up {
                return Err(DrawError::LockTimeout(key.to_string()));
            }
            tokio::time::sleep(ACQUIRE_POLL).await;
        }
    }
}

struct MemoryLockGuard {
    key: String,
    owner: String,
    locks: LockMap,
    released: bool,
}

impl MemoryLockGuard {
    fn release_if_owner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        with_locks(&self.locks, |locks| {
            // Only the current owner may release; an expired-and-stolen
            // lock belongs to someone else now.
            if locks.get(&self.key).is_some_and(|e| e.owner == self.owner) {
                locks.remove(&self.key);
            }
        });
    }
}

impl Drop for MemoryLockGuard {
    fn drop(&mut self) {
        self.release_if_owner();
    }
}

#[async_trait]
impl DrawLockGuard for MemoryLockGuard {
    fn owner_token(&self) -> &str {
        &self.owner
    }

    async fn renew(&self, ttl: Duration) -> DrawResult<()> {
        let renewed = with_locks(&self.locks, |locks| match locks.get_mut(&self.key) {
            Some(entry) if entry.owner == self.owner => {
                entry.deadline = Instant::now() + ttl;
                true
            }
            _ => false,
        });
        if renewed {
            Ok(())
        } else {
            Err(DrawError::LockTimeout(self.key.clone()))
        }
    }

    async fn release(mut self: Box<Self>) -> DrawResult<()> {
        self.release_if_owner();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_waits_for_release() {
        let service = MemoryLockService::new();
        let ttl = Duration::from_secs(5);

        let guard = service.acquire("k", ttl, Duration::from_millis(50)).await.unwrap();
        let contender = service.acquire("k", ttl, Duration::from_millis(50)).await;
        assert!(matches!(contender, Err(DrawError::LockTimeout(_))));

        guard.release().await.unwrap();
        let after = service.acquire("k", ttl, Duration::from_millis(50)).await;
        assert!(after.is_ok());
    }

    #[tokio::test]
    async fn dropped_guard_frees_the_key() {
        let service = MemoryLockService::new();
        let ttl = Duration::from_secs(5);
        {
            let _guard = service.acquire("k", ttl, Duration::from_millis(50)).await.unwrap();
        }
        let after = service.acquire("k", ttl, Duration::from_millis(50)).await;
        assert!(after.is_ok());
    }

    #[tokio::test]
    async fn expired_lock_can_be_stolen() {
        let service = MemoryLockService::new();
        let guard = service
            .acquire("k", Duration::from_millis(20), Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let stolen =
            service.acquire("k", Duration::from_secs(1), Duration::from_millis(50)).await;
        assert!(stolen.is_ok());
        // The stale guard's release must not evict the new owner.
        guard.release().await.unwrap();
        let contender =
            service.acquire("k", Duration::from_secs(1), Duration::from_millis(30)).await;
        assert!(matches!(contender, Err(DrawError::LockTimeout(_))));
    }

    #[tokio::test]
    async fn distinct_keys_do_not_contend() {
        let service = MemoryLockService::new();
        let ttl = Duration::from_secs(5);
        let _a = service.acquire("a", ttl, Duration::from_millis(50)).await.unwrap();
        let b = service.acquire("b", ttl, Duration::from_millis(50)).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn renew_extends_the_deadline() {
        let service = MemoryLockService::new();
        let guard = service
            .acquire("k", Duration::from_millis(30), Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        guard.renew(Duration::from_secs(5)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        // Original TTL has long passed; renewed lock still holds.
        let contender =
            service.acquire("k", Duration::from_secs(1), Duration::from_millis(30)).await;
        assert!(matches!(contender, Err(DrawError::LockTimeout(_))));
    }
}
