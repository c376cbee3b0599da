use std::sync::Arc;

use hh_core::Hackhub;
use hh_store::{BlobStore, DocumentStore, FsBlobStore, InMemoryBlobStore, InMemoryDocumentStore};
use tokio::net::TcpListener;

use crate::auth::HttpIdentityService;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::{build_router, AppState};

/// Hackhub API server.
pub struct HackhubServer {
    config: ServerConfig,
}

impl HackhubServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Wire the core services from the configuration.
    ///
    /// Documents live in memory; blobs go to `blob_root` when it is set.
    pub async fn build_hub(&self) -> ServerResult<Hackhub> {
        let docs: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let blobs: Arc<dyn BlobStore> = match &self.config.blob_root {
            Some(root) => Arc::new(FsBlobStore::open(root.clone()).await?),
            None => Arc::new(InMemoryBlobStore::new()),
        };
        let identity = HttpIdentityService::new(
            &self.config.identity_url,
            self.config.identity_timeout(),
        )?;
        Ok(Hackhub::new(
            docs,
            blobs,
            Arc::new(identity),
            self.config.core.clone(),
        ))
    }

    /// Build the router (useful for testing).
    pub async fn router(&self) -> ServerResult<axum::Router> {
        Ok(build_router(AppState::new(self.build_hub().await?)))
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router().await?;
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            identity = %self.config.identity_url,
            "hackhub server listening"
        );
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
