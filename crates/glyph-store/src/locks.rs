use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use glyph_types::LogicalId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per logical id.
///
/// Serializes `write` and `finalize` for the same id while letting distinct
/// ids proceed in parallel. A lock lives in the map only while someone holds
/// or waits on it.
#[derive(Default)]
pub(crate) struct IdLocks {
    locks: Mutex<HashMap<LogicalId, Arc<AsyncMutex<()>>>>,
}

impl IdLocks {
    pub(crate) async fn lock(&self, id: &LogicalId) -> IdGuard<'_> {
        let lock = {
            let mut map = self.locks.lock().expect("lock poisoned");
            Arc::clone(map.entry(id.clone()).or_default())
        };
        IdGuard {
            locks: self,
            id: id.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }
}

/// Held for the duration of one write or finalize.
pub(crate) struct IdGuard<'a> {
    locks: &'a IdLocks,
    id: LogicalId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut map = self.locks.locks.lock().expect("lock poisoned");
        // Waiters hold a clone, so a count of one means nobody else wants it.
        if map.get(&self.id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn held(locks: &IdLocks) -> usize {
        locks.locks.lock().unwrap().len()
    }

    #[tokio::test]
    async fn same_id_is_serialized() {
        let locks = Arc::new(IdLocks::default());
        let guard = locks.lock(&LogicalId::image(1)).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.lock(&LogicalId::image(1)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn distinct_ids_do_not_block() {
        let locks = IdLocks::default();
        let _a = locks.lock(&LogicalId::image(1)).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(&LogicalId::image(2))).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn released_locks_are_pruned() {
        let locks = IdLocks::default();
        for n in 0..5 {
            let _guard = locks.lock(&LogicalId::image(n)).await;
            assert_eq!(held(&locks), 1);
        }
        assert_eq!(held(&locks), 0);
    }

    #[tokio::test]
    async fn contended_lock_survives_first_release() {
        let locks = Arc::new(IdLocks::default());
        let id = LogicalId::image(7);
        let guard = locks.lock(&id).await;

        let contender = {
            let locks = Arc::clone(&locks);
            let id = id.clone();
            tokio::spawn(async move {
                let _g = locks.lock(&id).await;
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);
        assert_eq!(held(&locks), 1);
        contender.await.unwrap();
        assert_eq!(held(&locks), 0);
    }
}
