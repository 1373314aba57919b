//! Per-chat turn locks that serialize turns on one chat

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;

type LockMap = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

/// Registry of per-chat turn locks
///
/// A chat's entry exists only while some turn holds or waits for its lock.
/// Waiters are served in arrival order (tokio mutexes are fair).
#[derive(Clone, Default)]
pub struct ChatLocks {
    inner: Arc<Mutex<LockMap>>,
}

/// Exclusive hold on one chat; releases and evicts on drop
pub struct ChatGuard {
    chat_id: String,
    locks: ChatLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ChatLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait for exclusive access to `chat_id`
    pub async fn acquire(&self, chat_id: &str) -> ChatGuard {
        let lock = Arc::clone(self.map().entry(chat_id.to_string()).or_default());
        let guard = lock.lock_owned().await;
        ChatGuard {
            chat_id: chat_id.to_string(),
            locks: self.clone(),
            guard: Some(guard),
        }
    }

    /// Number of chats with a held or awaited lock
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChatGuard {
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }
}

impl Drop for ChatGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.locks.map();
        // Only the registry's own reference left: nobody holds or waits.
        if map
            .get(&self.chat_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.chat_id);
        }
    }
}
