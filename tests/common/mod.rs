//! Shared fakes and mock origins for integration tests.
#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, Response, Uri};
use futures_util::future::BoxFuture;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use backend_dispatch::config::Origin;
use backend_dispatch::error::TransportError;
use backend_dispatch::http::{InterceptorContext, OriginClient};
use backend_dispatch::load_balancer::{LoadBalancer, Preferences, RemoteHost};
use backend_dispatch::resilience::{RetryContext, RetryDecision, RetryPolicy};

/// What a fake origin does with each request.
#[derive(Clone)]
pub enum Behaviour {
    Respond {
        status: u16,
        body: &'static str,
        headers: Vec<(&'static str, &'static str)>,
    },
    Fail,
    Hang,
}

impl Behaviour {
    pub fn ok(body: &'static str) -> Self {
        Behaviour::Respond { status: 200, body, headers: Vec::new() }
    }

    pub fn status(status: u16, body: &'static str) -> Self {
        Behaviour::Respond { status, body, headers: Vec::new() }
    }
}

/// A request as seen by a fake origin.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

/// In-process origin client with scripted behaviour.
pub struct FakeOrigin {
    origin: Origin,
    behaviour: Behaviour,
    calls: AtomicUsize,
    requests: Mutex<Vec<SeenRequest>>,
    bodies: Arc<Mutex<Vec<Bytes>>>,
}

impl FakeOrigin {
    pub fn new(origin: Origin, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            origin,
            behaviour,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            bodies: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Request bodies read to completion, in arrival order.
    pub fn bodies(&self) -> Vec<Bytes> {
        self.bodies.lock().unwrap().clone()
    }

    pub fn remote_host(self: &Arc<Self>) -> RemoteHost {
        RemoteHost::new(self.origin.clone(), self.clone())
    }
}

impl OriginClient for FakeOrigin {
    fn handle(
        &self,
        request: Request<Body>,
        _context: &InterceptorContext,
    ) -> BoxFuture<'static, Result<Response<Body>, TransportError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(SeenRequest {
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
        });

        let origin_id = self.origin.id.clone();
        let bodies = self.bodies.clone();
        let read_body = async move {
            if let Ok(bytes) = axum::body::to_bytes(request.into_body(), usize::MAX).await {
                bodies.lock().unwrap().push(bytes);
            }
        };

        match self.behaviour.clone() {
            Behaviour::Respond { status, body, headers } => Box::pin(async move {
                read_body.await;
                let mut builder = Response::builder().status(status);
                for (name, value) in headers {
                    builder = builder.header(name, value);
                }
                Ok(builder.body(Body::from(body)).unwrap())
            }),
            Behaviour::Fail => Box::pin(async move {
                read_body.await;
                Err(TransportError::connect(origin_id, "connection refused"))
            }),
            Behaviour::Hang => Box::pin(futures_util::future::pending()),
        }
    }
}

/// Returns the first host not on the avoid-list, else the first host.
pub struct FakeLoadBalancer {
    hosts: Vec<RemoteHost>,
    sticky: bool,
    seen: Mutex<Vec<Preferences>>,
}

impl FakeLoadBalancer {
    pub fn new(hosts: Vec<RemoteHost>) -> Arc<Self> {
        Arc::new(Self { hosts, sticky: false, seen: Mutex::new(Vec::new()) })
    }

    pub fn sticky(hosts: Vec<RemoteHost>) -> Arc<Self> {
        Arc::new(Self { hosts, sticky: true, seen: Mutex::new(Vec::new()) })
    }

    pub fn empty() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn seen(&self) -> Vec<Preferences> {
        self.seen.lock().unwrap().clone()
    }
}

impl LoadBalancer for FakeLoadBalancer {
    fn choose(&self, preferences: &Preferences) -> Option<RemoteHost> {
        self.seen.lock().unwrap().push(preferences.clone());
        self.hosts
            .iter()
            .find(|h| !preferences.avoids(h.origin()))
            .or_else(|| self.hosts.first())
            .cloned()
    }

    fn sticky_sessions_enabled(&self) -> bool {
        self.sticky
    }
}

/// A retry context captured by [`RecordingPolicy`].
#[derive(Debug, Clone)]
pub struct SeenContext {
    pub attempt: u32,
    pub previous: Vec<String>,
    pub avoid: Vec<String>,
    pub error_class: Option<&'static str>,
    pub uri: String,
}

/// Retries while the attempt count is below a limit, recording each context.
pub struct RecordingPolicy {
    retry_below: u32,
    seen: Mutex<Vec<SeenContext>>,
}

impl RecordingPolicy {
    pub fn always() -> Arc<Self> {
        Self::retry_while_below(u32::MAX)
    }

    pub fn never() -> Arc<Self> {
        Self::retry_while_below(0)
    }

    pub fn retry_while_below(limit: u32) -> Arc<Self> {
        Arc::new(Self { retry_below: limit, seen: Mutex::new(Vec::new()) })
    }

    pub fn seen(&self) -> Vec<SeenContext> {
        self.seen.lock().unwrap().clone()
    }
}

impl RetryPolicy for RecordingPolicy {
    fn evaluate(
        &self,
        context: &RetryContext<'_>,
        _load_balancer: &dyn LoadBalancer,
        preferences: &Preferences,
    ) -> RetryDecision {
        self.seen.lock().unwrap().push(SeenContext {
            attempt: context.attempt(),
            previous: context.previous_origins().iter().map(|h| h.id().to_string()).collect(),
            avoid: preferences.avoid_origins().iter().map(|o| o.id.clone()).collect(),
            error_class: context.last_error().map(|e| e.class()),
            uri: context.request().uri.to_string(),
        });
        RetryDecision::from(context.attempt() < self.retry_below)
    }
}

/// Bind an ephemeral local port.
pub async fn bind_local() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Start a programmable mock origin; returns its address.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let (listener, addr) = bind_local().await;
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 8192];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let head = String::from_utf8_lossy(&buf[..n]).to_string();

                        let (status, body) = f(head).await;
                        let status_text = match status {
                            200 => "200 OK",
                            204 => "204 No Content",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a mock origin that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let (listener, addr) = bind_local().await;
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}
