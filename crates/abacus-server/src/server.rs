//! HTTP transport.
//!
//! Binds a TCP listener and serves hyper http1 connections. Routing is
//! deliberately small: `POST /method` runs the dispatch pipeline,
//! `GET /health` answers liveness, anything else is a 404 failure
//! envelope. Responses always carry the JSON envelope and echo the
//! request id header.
//!
//! # Example
//!
//! ```rust,ignore
//! use abacus_server::{ApiServer, Dispatcher, ServerConfig};
//!
//! let server = ApiServer::new(ServerConfig::default(), dispatcher);
//! server.run().await?;
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tokio::net::TcpListener;
use uuid::Uuid;

use abacus_core::{ApiError, RequestContext, RequestId, ResponseEnvelope};

use crate::dispatch::Dispatcher;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Default bind address.
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";

/// Default graceful shutdown timeout, in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default request body timeout, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Header carrying the request id, both ways.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Type alias for the HTTP response body.
pub type ResponseBody = Full<Bytes>;

/// Type alias for the HTTP response.
pub type HttpResponse = Response<ResponseBody>;

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address, e.g. `0.0.0.0:8080`.
    http_addr: String,

    /// How long to wait for in-flight connections at shutdown.
    shutdown_timeout: Duration,

    /// How long to wait for a request body.
    request_timeout: Duration,
}

impl ServerConfig {
    /// Starts a configuration builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// The configured bind address string.
    #[must_use]
    pub fn http_addr(&self) -> &str {
        &self.http_addr
    }

    /// The graceful shutdown timeout.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// The request body timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns the parse error when the address is not a valid
    /// `host:port` socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.http_addr.parse()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    http_addr: Option<String>,
    shutdown_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl ServerConfigBuilder {
    /// Creates a builder with every setting at its default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bind address.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.http_addr = Some(addr.into());
        self
    }

    /// Sets the graceful shutdown timeout.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Sets the request body timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Builds the configuration, filling unset values with defaults.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            http_addr: self
                .http_addr
                .unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string()),
            shutdown_timeout: self
                .shutdown_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS)),
            request_timeout: self
                .request_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
        }
    }
}

/// The Abacus HTTP server.
///
/// Owns the transport configuration and a shared [`Dispatcher`]; every
/// connection task gets a clone of the dispatcher handle.
pub struct ApiServer {
    /// Transport configuration.
    config: ServerConfig,

    /// Request pipeline, shared across connection tasks.
    dispatcher: Arc<Dispatcher>,
}

impl ApiServer {
    /// Creates a server over the given dispatcher.
    #[must_use]
    pub fn new(config: ServerConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self { config, dispatcher }
    }

    /// The transport configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Runs the server until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::BindError`] when the configured address
    /// does not parse or cannot be bound.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Runs the server with an externally controlled shutdown signal.
    ///
    /// Used by tests and callers that coordinate shutdown themselves.
    /// At shutdown the listener stops accepting, in-flight connections
    /// get up to the shutdown timeout to drain, and the store cache is
    /// flushed.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::BindError`] when the configured address
    /// does not parse or cannot be bound.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.config.socket_addr().map_err(|e| {
            ServerError::BindError(format!(
                "Invalid address '{}': {}",
                self.config.http_addr(),
                e
            ))
        })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        tracing::info!("Server listening on {}", addr);

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        // Accept connections until shutdown
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => {
                            let server = Arc::clone(&server);
                            let token = tracker.acquire();
                            let shutdown_clone = shutdown.clone();

                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, remote_addr, shutdown_clone).await {
                                    tracing::error!("Connection error from {}: {}", remote_addr, e);
                                }
                                drop(token);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }

                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        // Wait for in-flight connections with timeout
        let shutdown_timeout = server.config.shutdown_timeout();
        tracing::info!(
            "Waiting up to {:?} for {} connections to close",
            shutdown_timeout,
            tracker.active_connections()
        );

        tokio::select! {
            _ = tracker.wait_for_shutdown() => {
                tracing::info!("All connections closed");
            }
            _ = tokio::time::sleep(shutdown_timeout) => {
                tracing::warn!(
                    "Shutdown timeout reached, {} connections still active",
                    tracker.active_connections()
                );
            }
        }

        server.dispatcher.store().flush();

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Handles a single connection.
    async fn handle_connection(
        self: &Arc<Self>,
        stream: tokio::net::TcpStream,
        remote_addr: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(self);

        let service = service_fn(move |req: Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { server.handle_request(req).await }
        });

        let conn = http1::Builder::new().serve_connection(io, service);

        tokio::select! {
            result = conn => {
                result
            }
            _ = shutdown.recv() => {
                tracing::debug!("Connection from {} closed due to shutdown", remote_addr);
                Ok(())
            }
        }
    }

    /// Handles a single HTTP request.
    async fn handle_request(
        self: &Arc<Self>,
        req: Request<Incoming>,
    ) -> Result<HttpResponse, Infallible> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let request_id = request_id_from_headers(req.headers());

        tracing::debug!("{} {}", method, path);

        match (method.as_ref(), path.as_str()) {
            ("GET", "/health") => return Ok(with_request_id(self.handle_health(), request_id)),
            ("POST", "/method") => {}
            _ => {
                return Ok(with_request_id(
                    failure_response(StatusCode::NOT_FOUND, "Not Found"),
                    request_id,
                ))
            }
        }

        // Collect request body with timeout
        let body_result =
            tokio::time::timeout(self.config.request_timeout(), Self::collect_body(req)).await;

        let body = match body_result {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                tracing::error!("Failed to read request body: {}", e);
                return Ok(with_request_id(
                    failure_response(StatusCode::BAD_REQUEST, "Bad Request"),
                    request_id,
                ));
            }
            Err(_) => {
                tracing::warn!("Request body collection timed out");
                return Ok(with_request_id(
                    failure_response(StatusCode::REQUEST_TIMEOUT, "Request Timeout"),
                    request_id,
                ));
            }
        };

        Ok(with_request_id(
            self.handle_method(&body, request_id),
            request_id,
        ))
    }

    /// Collects the request body into bytes.
    async fn collect_body(req: Request<Incoming>) -> Result<Bytes, hyper::Error> {
        let body = req.into_body();
        let collected = body.collect().await?;
        Ok(collected.to_bytes())
    }

    /// Handles the /health endpoint.
    fn handle_health(&self) -> HttpResponse {
        let body = serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
        });

        Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap_or_else(|_| Response::new(Full::new(Bytes::from(r#"{"status":"ok"}"#))))
    }

    /// Runs one `POST /method` body through the dispatcher.
    fn handle_method(&self, body: &[u8], request_id: RequestId) -> HttpResponse {
        let Ok(payload) = serde_json::from_slice::<Value>(body) else {
            return failure_response(StatusCode::BAD_REQUEST, "Bad Request");
        };

        let mut ctx = RequestContext::with_request_id(request_id);
        let method_name = payload
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("-")
            .to_owned();

        let (envelope, status) = match self.dispatcher.dispatch(&payload, &mut ctx) {
            Ok(response) => (ResponseEnvelope::success(response), StatusCode::OK),
            Err(error) => {
                if matches!(error, ApiError::Internal { .. }) {
                    tracing::error!("Request failed internally: {}", error);
                }
                let status = error.status_code();
                (ResponseEnvelope::from_error(&error), status)
            }
        };

        log_completion(&ctx, &method_name, status);
        envelope_response(&envelope, status)
    }
}

/// One completion line per dispatched request, with whatever context
/// the handler recorded.
fn log_completion(ctx: &RequestContext, method: &str, status: StatusCode) {
    let duration_ms = u64::try_from(ctx.elapsed().as_millis()).unwrap_or(u64::MAX);

    if let Some(nclients) = ctx.nclients() {
        tracing::info!(
            request_id = %ctx.request_id(),
            method,
            http.status_code = status.as_u16(),
            duration_ms,
            nclients,
            "Request completed"
        );
    } else if let Some(has) = ctx.has() {
        tracing::info!(
            request_id = %ctx.request_id(),
            method,
            http.status_code = status.as_u16(),
            duration_ms,
            has = ?has,
            "Request completed"
        );
    } else {
        tracing::info!(
            request_id = %ctx.request_id(),
            method,
            http.status_code = status.as_u16(),
            duration_ms,
            "Request completed"
        );
    }
}

fn request_id_from_headers(headers: &HeaderMap) -> RequestId {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .map_or_else(RequestId::new, RequestId::from_uuid)
}

fn with_request_id(mut response: HttpResponse, request_id: RequestId) -> HttpResponse {
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn failure_response(status: StatusCode, message: &str) -> HttpResponse {
    let envelope = ResponseEnvelope::failure(serde_json::json!(message), status);
    envelope_response(&envelope, status)
}

fn envelope_response(envelope: &ResponseEnvelope, status: StatusCode) -> HttpResponse {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(envelope.to_json())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from(envelope.to_json()))))
}

/// Server error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// Failed to bind to the configured address.
    BindError(String),

    /// I/O error during server operation.
    IoError(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BindError(msg) => write!(f, "Bind error: {}", msg),
            Self::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {}
