//! Origin connection clients.
//!
//! # Responsibilities
//! - Define the seam between the dispatcher and the transport ([`OriginClient`])
//! - Provide a pooled hyper-based client for plain-HTTP origins
//! - Map transport failures onto [`TransportError`] kinds
//!
//! # Design Decisions
//! - Pooling is delegated to hyper-util's legacy client; connection caps to [`ConnectionLimiter`]
//! - One client per origin; the URI authority is rewritten to the origin
//! - TLS to origins is not handled here; HTTPS services are rejected up front

use axum::body::Body;
use axum::http::uri::{Authority, Scheme};
use axum::http::{Request, Response, Uri};
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::error::Error as _;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{BackendServiceConfig, Origin, Protocol};
use crate::error::{DispatchError, TransportError, TransportErrorKind};
use crate::http::pool::ConnectionLimiter;
use crate::http::request::InterceptorContext;
use crate::resilience::timeouts::with_response_timeout;

/// hyper refuses read buffers smaller than this.
const MIN_HTTP1_BUF_SIZE: usize = 8192;

/// A connection-capable client bound to one origin.
///
/// Implementations must be safe to call concurrently from many requests.
/// Dropping the returned future aborts the exchange.
pub trait OriginClient: Send + Sync {
    fn handle(
        &self,
        request: Request<Body>,
        context: &InterceptorContext,
    ) -> BoxFuture<'static, Result<Response<Body>, TransportError>>;
}

/// Pooled HTTP/1.1 client for a single origin.
#[derive(Clone)]
pub struct HyperOriginClient {
    origin: Origin,
    authority: Authority,
    client: Client<HttpConnector, Body>,
    limiter: Arc<ConnectionLimiter>,
    response_timeout: Duration,
}

impl HyperOriginClient {
    /// Build a client for `origin` using the service's pool and timeout settings.
    pub fn new(origin: Origin, service: &BackendServiceConfig) -> Result<Self, DispatchError> {
        if service.protocol() == Protocol::Https {
            return Err(DispatchError::UnsupportedProtocol {
                app_id: service.id().to_string(),
                protocol: service.protocol().to_string(),
            });
        }

        let authority = Authority::from_str(&origin.host_and_port()).map_err(|e| {
            DispatchError::Transport(TransportError::new(
                origin.id.clone(),
                TransportErrorKind::Protocol,
                format!("invalid origin address: {}", e),
            ))
        })?;

        let pool = service.connection_pool();
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(pool.connect_timeout()));
        connector.set_nodelay(true);

        // hyper-util caps idle connections only; the in-flight cap is the limiter's.
        let mut builder = Client::builder(TokioExecutor::new());
        builder
            .pool_max_idle_per_host(pool.max_connections_per_host)
            .pool_idle_timeout(pool.connection_expiration());
        if service.max_header_size() >= MIN_HTTP1_BUF_SIZE {
            builder.http1_max_buf_size(service.max_header_size());
        }
        let client = builder.build(connector);

        tracing::debug!(
            app_id = %service.id(),
            origin_id = %origin.id,
            address = %authority,
            "Origin client created"
        );

        Ok(Self {
            origin,
            authority,
            client,
            limiter: Arc::new(ConnectionLimiter::new(pool)),
            response_timeout: service.response_timeout(),
        })
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn limiter(&self) -> &ConnectionLimiter {
        &self.limiter
    }

    fn origin_uri(&self, uri: &Uri) -> Result<Uri, TransportError> {
        let mut parts = uri.clone().into_parts();
        parts.scheme = Some(Scheme::HTTP);
        parts.authority = Some(self.authority.clone());
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some("/".parse().map_err(|e| {
                TransportError::new(self.origin.id.clone(), TransportErrorKind::Protocol, format!("{}", e))
            })?);
        }
        Uri::from_parts(parts).map_err(|e| {
            TransportError::new(self.origin.id.clone(), TransportErrorKind::Protocol, e.to_string())
        })
    }
}

impl OriginClient for HyperOriginClient {
    fn handle(
        &self,
        request: Request<Body>,
        context: &InterceptorContext,
    ) -> BoxFuture<'static, Result<Response<Body>, TransportError>> {
        let client = self.client.clone();
        let limiter = self.limiter.clone();
        let origin_id = self.origin.id.clone();
        let limit = self.response_timeout;
        let request_id = context.request_id();

        let prepared = self.origin_uri(request.uri()).map(|uri| {
            let (mut parts, body) = request.into_parts();
            parts.uri = uri;
            Request::from_parts(parts, body)
        });

        Box::pin(async move {
            let request = prepared?;
            let _permit = limiter.acquire(&origin_id).await?;
            tracing::trace!(request_id = %request_id, origin_id = %origin_id, uri = %request.uri(), "Sending request to origin");

            with_response_timeout(&origin_id, limit, async {
                let response = client
                    .request(request)
                    .await
                    .map_err(|e| classify_client_error(&origin_id, &e))?;
                let (parts, body) = response.into_parts();
                Ok(Response::from_parts(parts, Body::new(body)))
            })
            .await
        })
    }
}

fn classify_client_error(origin_id: &str, err: &hyper_util::client::legacy::Error) -> TransportError {
    let kind = if err.is_connect() {
        TransportErrorKind::Connect
    } else if err
        .source()
        .and_then(|s| s.downcast_ref::<hyper::Error>())
        .map(|e| e.is_parse() || e.is_user())
        .unwrap_or(false)
    {
        TransportErrorKind::Protocol
    } else {
        TransportErrorKind::Io
    };

    let message = match err.source() {
        Some(source) => format!("{}: {}", err, source),
        None => err.to_string(),
    };
    TransportError::new(origin_id, kind, message)
}
