use crate::backend::{Backend, OllamaBackend};
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::recommend::ModelCatalog;
use crate::store::{AsyncStore, ConversationStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Shared application state for the HTTP server
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    dispatcher: Dispatcher,
    catalog: ModelCatalog,
    shutdown: CancellationToken,
    turns: TaskTracker,
}

impl AppState {
    /// Build state from configuration, opening the store and backend client
    pub fn new(config: Config) -> Result<Self> {
        let backend: Arc<dyn Backend> = Arc::new(OllamaBackend::new(config.backend.clone())?);
        let store = AsyncStore::new(ConversationStore::open_configured(
            config.storage.db_path.as_deref(),
        )?);
        Self::with_parts(config, backend, store)
    }

    /// Build state around an existing backend and store
    pub fn with_parts(config: Config, backend: Arc<dyn Backend>, store: AsyncStore) -> Result<Self> {
        let catalog = ModelCatalog::new(Arc::clone(&backend), &config.recommender)?;
        let dispatcher = Dispatcher::new(backend, store, &config);
        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                dispatcher,
                catalog,
                shutdown: CancellationToken::new(),
                turns: TaskTracker::new(),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn store(&self) -> &AsyncStore {
        self.inner.dispatcher.store()
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        self.inner.dispatcher.backend()
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.inner.catalog
    }

    /// Cancelled when the server begins shutting down
    pub fn shutdown(&self) -> &CancellationToken {
        &self.inner.shutdown
    }

    /// Streaming turns still running; shutdown waits for them
    pub fn turns(&self) -> &TaskTracker {
        &self.inner.turns
    }
}
