use super::ConversationStore;
use crate::error::{LaimError, Result};
use std::sync::Arc;

/// Shared handle running store operations on the blocking thread pool
#[derive(Clone)]
pub struct AsyncStore {
    inner: Arc<ConversationStore>,
}

impl AsyncStore {
    pub fn new(store: ConversationStore) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Run `f` against the store without blocking the async runtime
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn demo(store: laim::store::AsyncStore) -> laim::error::Result<()> {
    /// let session = store.call(|s| s.create_session()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&ConversationStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| LaimError::Storage(format!("storage task failed: {}", e)))?
    }

    /// Direct access for synchronous callers
    pub fn blocking(&self) -> &ConversationStore {
        &self.inner
    }
}
