//! Serve command implementation.

use docfeed_core::StoreConfig;
use docfeed_server::{ServerConfig, SyncServer};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

/// Options for the serve command.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Listen address.
    pub bind: SocketAddr,
    /// Shared secret, if connections must present one.
    pub secret: Option<String>,
    /// Cookie carrying the secret.
    pub secret_name: String,
    /// Headers per update message.
    pub max_headers: usize,
    /// Outbound queue size per client.
    pub queue: usize,
    /// Fsync each committed batch.
    pub sync_on_commit: bool,
}

impl ServeOptions {
    fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new(self.bind)
            .with_max_headers_per_message(self.max_headers)
            .with_outbound_queue_capacity(self.queue)
            .with_secret_name(self.secret_name.clone());
        if let Some(secret) = &self.secret {
            config = config.with_secret(secret.clone());
        }
        config
    }
}

/// Runs the serve command until Ctrl-C.
pub fn run(path: &Path, options: ServeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(
        path,
        StoreConfig::default().sync_on_commit(options.sync_on_commit),
    )?;
    let server = Arc::new(SyncServer::new(options.server_config(), Arc::new(store))?);

    let info = server.info()?;
    tracing::info!(
        documents = info.documents,
        max_rev = ?info.max_rev,
        secret = options.secret.is_some(),
        "store ready"
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        tokio::select! {
            result = Arc::clone(&server).run() => {
                result?;
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("shutting down");
            }
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
