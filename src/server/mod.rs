//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and dispatches HTTP/1.1 requests either to an
//! [`App`] or to any async handler function. Connections are persistent
//! (keep-alive) unless the client asks otherwise, and every request runs
//! under a deadline.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maximum size of a complete HTTP request we will buffer before rejecting it (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The HTTP server.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use ninaf::actions;
/// use ninaf::app::App;
/// use ninaf::server::Server;
/// use ninaf::settings::Settings;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let settings = Settings::default();
///     let server = Server::bind(&settings.server.bind)
///         .await?
///         .with_timeout(settings.request_timeout());
///     let app = App::new(settings, actions::registry())?;
///     server.serve(Arc::new(app)).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    timeout: Duration,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Sets the per-request deadline. A request still running when it expires
    /// is answered with `503 Service Unavailable`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves `app` until the listener fails.
    ///
    /// [`App::handle`] is synchronous, so each request runs on Tokio's
    /// blocking pool; a panicking action yields a 500.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn serve(self, app: Arc<App>) -> Result<(), ServerError> {
        self.run(move |request| {
            let app = Arc::clone(&app);
            async move {
                match tokio::task::spawn_blocking(move || app.handle(request)).await {
                    Ok(response) => response,
                    Err(e) => {
                        error!(error = %e, "request handler failed");
                        Response::new(StatusCode::InternalServerError)
                    }
                }
            }
        })
        .await
    }

    /// Starts accepting connections and dispatching requests to `handler`.
    ///
    /// The handler receives a [`Request`] and must return a [`Future`] that
    /// resolves to a [`Response`]. It is shared across all spawned Tokio
    /// tasks, so it must be `Send + Sync + 'static`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let handler = Arc::new(handler);
        info!(address = %self.local_addr, timeout = ?self.timeout, "ninaf listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let handler = Arc::clone(&handler);
            let timeout = self.timeout;

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, handler, timeout).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Handles a single TCP connection over its lifetime, one request per
/// iteration, until the peer closes it or signals `Connection: close`.
///
/// Requests already sitting in the buffer (pipelined behind the previous
/// one) are served before the socket is read again.
async fn handle_connection<H, F>(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<H>,
    timeout: Duration,
) -> Result<(), std::io::Error>
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);
    let mut need_more = true;

    loop {
        if need_more || buf.is_empty() {
            let bytes_read = stream.read_buf(&mut buf).await?;
            if bytes_read == 0 {
                debug!(peer = %peer_addr, "connection closed by peer");
                break;
            }
            need_more = false;
        }

        if buf.len() > MAX_REQUEST_SIZE {
            warn!(peer = %peer_addr, "request too large, sending 413");
            return reject(&mut stream, StatusCode::PayloadTooLarge).await;
        }

        let (request, body_offset) = match Request::parse(&buf) {
            Ok(pair) => pair,
            // Headers not complete yet.
            Err(RequestError::Incomplete) => {
                need_more = true;
                continue;
            }
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request, sending 400");
                return reject(&mut stream, StatusCode::BadRequest).await;
            }
        };

        let content_length = request.content_length().unwrap_or(0);
        let total_needed = match body_offset.checked_add(content_length) {
            Some(total) if total <= MAX_REQUEST_SIZE => total,
            _ => {
                warn!(peer = %peer_addr, content_length, "declared body too large, sending 413");
                return reject(&mut stream, StatusCode::PayloadTooLarge).await;
            }
        };
        if buf.len() < total_needed {
            need_more = true;
            continue;
        }

        let request = request.with_body(Bytes::copy_from_slice(&buf[body_offset..total_needed]));
        let keep_alive = request.is_keep_alive();

        debug!(
            peer = %peer_addr,
            method = %request.method(),
            path = %request.path(),
            "dispatching request"
        );

        let response = match tokio::time::timeout(timeout, handler(request)).await {
            Ok(response) => response,
            Err(_) => {
                warn!(peer = %peer_addr, ?timeout, "request deadline expired, sending 503");
                Response::new(StatusCode::ServiceUnavailable)
            }
        };
        stream
            .write_all(&response.keep_alive(keep_alive).into_bytes())
            .await?;
        stream.flush().await?;

        let _ = buf.split_to(total_needed);

        if !keep_alive {
            debug!(peer = %peer_addr, "Connection: close, shutting down");
            break;
        }
    }

    Ok(())
}

/// Answers with `status` and gives up on the connection.
async fn reject(stream: &mut TcpStream, status: StatusCode) -> Result<(), std::io::Error> {
    let response = Response::new(status).keep_alive(false);
    stream.write_all(&response.into_bytes()).await?;
    stream.flush().await
}
