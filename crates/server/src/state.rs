use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use cocktails::{ItemService, ItemStore, MediaStore};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Shared application state
///
/// Built once at startup and read-only afterwards; handlers receive it as
/// `State<Arc<ServerState>>`.
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Item query service over the configured document store
    pub items: ItemService,

    /// Media store for cocktail images
    pub media: Arc<dyn MediaStore>,

    /// Prometheus render handle, present when a recorder was installed
    pub metrics: Option<PrometheusHandle>,
}

impl ServerState {
    /// Create new server state, opening the configured backends
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let store = config
            .store
            .build()
            .map_err(|e| ServerError::Config(format!("document store: {e}")))?;
        let media = config
            .media
            .build()
            .map_err(|e| ServerError::Config(format!("media store: {e}")))?;

        tracing::info!(
            store = ?config.store.backend,
            collection = %config.store.collection,
            media = ?config.media.backend,
            "Backends initialized"
        );

        Ok(Self::with_backends(config, store, media))
    }

    /// Create server state around already-built backends
    pub fn with_backends(
        config: ServerConfig,
        store: Arc<dyn ItemStore>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            items: ItemService::new(store),
            media,
            metrics: None,
        }
    }

    /// Attach a Prometheus handle for the `/metrics` endpoint
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Release the document store once the server has drained
    pub async fn shutdown(&self) -> ServerResult<()> {
        self.items.store().close().await?;
        Ok(())
    }
}

/// Server metadata for health checks
#[derive(Debug, serde::Serialize)]
pub struct ServerMetadata {
    pub version: String,
    pub uptime_seconds: u64,
}
