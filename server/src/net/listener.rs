use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::engine::relay::ChatRelay;
use crate::error::ServerError;

use super::connection::Connection;
use super::handshake::handle_connection;

/// Bind the listening endpoint. Failure here is fatal to the server.
pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Accept connections and spawn a handshake task for each until the relay is
/// stopped or accepting fails. Either way every session is closed before this
/// returns.
pub async fn serve(listener: TcpListener, relay: Arc<ChatRelay>) -> Result<(), ServerError> {
    let cancel = relay.begin();
    accept_loop(listener, relay, cancel).await
}

async fn accept_loop(
    listener: TcpListener,
    relay: Arc<ChatRelay>,
    cancel: CancellationToken,
) -> Result<(), ServerError> {
    match listener.local_addr() {
        Ok(addr) => info!("relay listener started on {}", addr),
        Err(_) => info!("relay listener started"),
    }

    let settings = relay.settings().clone();
    let result = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("relay listener shutting down");
                break Ok(());
            }
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        let conn = Connection::new(
                            stream,
                            addr.to_string(),
                            settings.handshake_timeout,
                            settings.send_timeout,
                        );
                        tokio::spawn(handle_connection(relay.clone(), conn));
                    }
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                        break Err(ServerError::Accept(e));
                    }
                }
            }
        }
    };

    relay.shutdown().await;
    result
}

/// Owns the listening endpoint and the accept task, so the relay can be
/// stopped and started again within one process.
pub struct Server {
    relay: Arc<ChatRelay>,
    host: String,
    port: u16,
    task: Option<JoinHandle<Result<(), ServerError>>>,
}

impl Server {
    /// A stopped server bound to the relay's configured endpoint.
    pub fn new(relay: Arc<ChatRelay>) -> Self {
        let host = relay.settings().host.clone();
        let port = relay.settings().port;
        Self {
            relay,
            host,
            port,
            task: None,
        }
    }

    pub fn relay(&self) -> &Arc<ChatRelay> {
        &self.relay
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Endpoint used by the next `start`.
    pub fn set_endpoint(&mut self, host: impl Into<String>, port: u16) {
        self.host = host.into();
        self.port = port;
    }

    pub fn endpoint(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Bind and start accepting. Returns the bound address.
    pub async fn start(&mut self) -> Result<SocketAddr, ServerError> {
        if self.is_running() {
            return Err(ServerError::AlreadyRunning);
        }
        if let Some(task) = self.task.take() {
            // The previous run ended on its own; surface why.
            if let Err(e) = task.await? {
                warn!(error = %e, "previous server run failed");
            }
        }

        let addr = self.address();
        let listener = bind(&addr).await?;
        let local = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let cancel = self.relay.begin();
        self.task = Some(tokio::spawn(accept_loop(listener, self.relay.clone(), cancel)));
        Ok(local)
    }

    /// Stop accepting, close every session and wait for the accept task.
    /// Returns false if nothing was running.
    pub async fn stop(&mut self) -> Result<bool, ServerError> {
        self.relay.stop();
        match self.task.take() {
            Some(task) => {
                task.await??;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Wait for the current run to end on its own (accept failure or a stop
    /// requested through the relay). Returns at once if nothing is running.
    pub async fn wait(&mut self) -> Result<(), ServerError> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let result = task.await;
        self.task = None;
        result?
    }
}
