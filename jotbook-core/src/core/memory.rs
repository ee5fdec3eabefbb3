use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::storage::KeyValueStore;
use crate::{JotbookError, Result};

/// In-memory [`KeyValueStore`] for tests and sessions that should leave no trace.
///
/// Clones share the same map, so a credential store and a note repository built
/// from clones of one `MemoryStore` see each other's writes.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| JotbookError::Storage("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries()?.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Wraps a [`MemoryStore`] and fails reads or writes on demand.
#[cfg(test)]
#[derive(Clone, Debug, Default)]
pub(crate) struct FailingStore {
    inner: MemoryStore,
    fail_reads: Arc<std::sync::atomic::AtomicBool>,
    fail_writes: Arc<std::sync::atomic::AtomicBool>,
    /// Writes left until the one that fails; zero when disarmed.
    writes_until_failure: Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl FailingStore {
    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Fails only the `n`th write (1-based) from now on; later writes succeed.
    pub(crate) fn fail_nth_write(&self, n: usize) {
        self.writes_until_failure
            .store(n, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<()> {
        Self::check(&self.fail_writes)?;
        let left = self
            .writes_until_failure
            .fetch_update(
                std::sync::atomic::Ordering::SeqCst,
                std::sync::atomic::Ordering::SeqCst,
                |n| n.checked_sub(1),
            )
            .unwrap_or_else(|n| n);
        if left == 1 {
            return Err(JotbookError::Storage("simulated storage failure".to_string()));
        }
        Ok(())
    }

    fn check(flag: &std::sync::atomic::AtomicBool) -> Result<()> {
        if flag.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(JotbookError::Storage("simulated storage failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
impl KeyValueStore for FailingStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Self::check(&self.fail_reads)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.check_write()?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check_write()?;
        self.inner.remove(key).await
    }
}

/// Yields to the scheduler before every storage call, so concurrent
/// operations interleave between their read and their write.
#[cfg(test)]
#[derive(Clone, Debug, Default)]
pub(crate) struct YieldingStore(MemoryStore);

#[cfg(test)]
impl KeyValueStore for YieldingStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        tokio::task::yield_now().await;
        self.0.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        tokio::task::yield_now().await;
        self.0.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        tokio::task::yield_now().await;
        self.0.remove(key).await
    }
}
