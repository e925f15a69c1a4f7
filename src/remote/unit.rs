// ABOUTME: TCP server exposing a workspace as a remote unit
// ABOUTME: One request envelope and one response envelope per connection

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};
use uuid::Uuid;

use super::error::{RemoteError, Result};
use super::UnitService;
use crate::envelope::Envelope;
use crate::runner::TaskRunner;
use crate::workspace::Workspace;

/// A network-facing unit: accepts connections, reads one request envelope,
/// answers with one response envelope, and closes.
pub struct RemoteUnit {
    service: Arc<UnitService>,
}

impl RemoteUnit {
    pub fn new(workspace: Arc<Workspace>, runner: Arc<dyn TaskRunner>, capability: u64) -> Self {
        Self {
            service: Arc::new(UnitService::new(workspace, runner, capability)),
        }
    }

    pub fn service(&self) -> &Arc<UnitService> {
        &self.service
    }

    /// Accept loop. Each connection is served on its own tokio task; a
    /// failed connection is logged and never takes the listener down.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!(
            addr = %listener.local_addr()?,
            workspace = self.service.workspace().name(),
            "remote unit listening"
        );
        loop {
            let (stream, peer) = listener.accept().await?;
            let service = Arc::clone(&self.service);
            tokio::spawn(async move {
                let request_id = Uuid::new_v4();
                if let Err(e) = handle_connection(service, stream, request_id).await {
                    warn!(%request_id, %peer, error = %e, "connection failed");
                }
            });
        }
    }
}

async fn handle_connection(
    service: Arc<UnitService>,
    mut stream: TcpStream,
    request_id: Uuid,
) -> Result<()> {
    let request = Envelope::read_async(&mut stream).await?;
    info!(
        %request_id,
        command = request
            .meta()
            .get(super::KEY_COMMAND)
            .and_then(crate::MetaValue::as_str),
        "request received"
    );

    // Runners block; keep them off the reactor threads.
    let response = tokio::task::spawn_blocking(move || service.handle(&request))
        .await
        .map_err(|e| RemoteError::Handler(e.to_string()))?;

    response.write_async(&mut stream).await?;
    stream.shutdown().await?;
    Ok(())
}
