// ABOUTME: Per-target exclusion for deploy, rollback, and setup pipelines.
// ABOUTME: A shared set of in-flight target ids; membership is released when the ticket drops.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

/// Rejection returned when the target already has an operation in flight.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("an operation is already in progress for {target}")]
pub struct GuardError {
    pub target: String,
}

/// Registry of targets with an operation in flight.
///
/// Clones share the same registry. Different keys never contend; the guard
/// only serialises operations on the same key.
pub struct OperationGuard<K> {
    active: Arc<Mutex<HashSet<K>>>,
}

impl<K> Clone for OperationGuard<K> {
    fn clone(&self) -> Self {
        Self {
            active: Arc::clone(&self.active),
        }
    }
}

impl<K> Default for OperationGuard<K> {
    fn default() -> Self {
        Self {
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl<K> std::fmt::Debug for OperationGuard<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationGuard")
            .field("active", &self.active.lock().len())
            .finish()
    }
}

impl<K> OperationGuard<K>
where
    K: Eq + Hash + Clone + Display,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key`, failing if it is already registered.
    ///
    /// Check and insert happen under one lock, so two concurrent callers can
    /// never both succeed for the same key.
    pub fn try_acquire(&self, key: K) -> Result<GuardTicket<K>, GuardError> {
        let mut active = self.active.lock();
        if !active.insert(key.clone()) {
            return Err(GuardError {
                target: key.to_string(),
            });
        }
        tracing::debug!(target_id = %key, "operation guard acquired");
        Ok(GuardTicket {
            key: Some(key),
            active: Arc::clone(&self.active),
        })
    }

    /// Run `fut` while holding `key`. The key is released on every exit path,
    /// including a panic unwinding through the future.
    pub async fn run<F, T>(&self, key: K, fut: F) -> Result<T, GuardError>
    where
        F: Future<Output = T>,
    {
        let _ticket = self.try_acquire(key)?;
        Ok(fut.await)
    }

    pub fn is_active(&self, key: &K) -> bool {
        self.active.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.active.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.lock().is_empty()
    }
}

/// Proof of registration. Dropping it unregisters the key.
#[must_use = "the target is released as soon as the ticket is dropped"]
pub struct GuardTicket<K: Eq + Hash> {
    key: Option<K>,
    active: Arc<Mutex<HashSet<K>>>,
}

impl<K: Eq + Hash> Drop for GuardTicket<K> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.active.lock().remove(&key);
        }
    }
}

impl<K: Eq + Hash + std::fmt::Debug> std::fmt::Debug for GuardTicket<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardTicket").field("key", &self.key).finish()
    }
}
