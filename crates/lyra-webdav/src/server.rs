//! HTTP server lifecycle.
//!
//! Binds a listener, reads each request body up to the configured limit, and
//! hands the request to a [`DavHandler`].

use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::error::DavError;
use crate::handler::{DavHandler, DavResponse};

/// Where the server listens.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 = auto-assign).
    pub port: u16,
    pub bind_address: IpAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }
}

/// A running WebDAV server.
pub struct DavServer {
    /// The actual bound address.
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl DavServer {
    pub async fn start(handler: DavHandler, config: ServerConfig) -> Result<Self, std::io::Error> {
        let addr = SocketAddr::new(config.bind_address, config.port);
        let listener = TcpListener::bind(addr).await?;
        let actual_addr = listener.local_addr()?;

        info!(
            addr = %actual_addr,
            prefix = %handler.config().prefix,
            "Starting WebDAV server"
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server_handle = tokio::spawn(async move {
            tokio::select! {
                () = run_server(listener, handler) => {
                    debug!("Server loop ended");
                }
                _ = shutdown_rx => {
                    info!("Received shutdown signal");
                }
            }
        });

        Ok(Self {
            addr: actual_addr,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
        info!("WebDAV server stopped");
    }

    fn stop_sync(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            handle.abort();
        }
    }
}

impl Drop for DavServer {
    fn drop(&mut self) {
        self.stop_sync();
    }
}

async fn run_server(listener: TcpListener, handler: DavHandler) {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                let handler = handler.clone();
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req: Request<Incoming>| {
                        let handler = handler.clone();
                        async move { Ok::<_, Infallible>(serve(&handler, req).await) }
                    });

                    if let Err(e) = auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await
                    {
                        warn!(peer = %peer_addr, error = %e, "HTTP connection error");
                    }
                });
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }
}

/// Read the body within the upload limit, then dispatch.
async fn serve(handler: &DavHandler, req: Request<Incoming>) -> DavResponse {
    let (parts, body) = req.into_parts();
    let limit = handler.config().max_upload_bytes;

    match Limited::new(body, limit).collect().await {
        Ok(collected) => {
            handler
                .handle(Request::from_parts(parts, collected.to_bytes()))
                .await
        }
        Err(e) => {
            let err = if e.downcast_ref::<LengthLimitError>().is_some() {
                DavError::PayloadTooLarge
            } else {
                DavError::bad_request(format!("failed to read request body: {e}"))
            };
            handler.render_error(parts.method.as_str(), parts.uri.path(), err)
        }
    }
}
