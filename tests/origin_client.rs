//! HyperOriginClient against local mock origins.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use backend_dispatch::config::{BackendServiceConfig, ConnectionPoolSettings, Origin};
use backend_dispatch::dispatch::RequestDispatcher;
use backend_dispatch::error::TransportErrorKind;
use backend_dispatch::http::{HyperOriginClient, InterceptorContext, OriginClient};
use backend_dispatch::load_balancer::RemoteHost;
use common::{
    bind_local, start_programmable_backend, start_silent_backend, FakeLoadBalancer, RecordingPolicy,
};

fn service(addrs: &[(&str, SocketAddr)], response_timeout_millis: u64) -> BackendServiceConfig {
    BackendServiceConfig::builder()
        .id("shop")
        .origins(
            addrs
                .iter()
                .map(|(id, addr)| Origin::new(addr.ip().to_string(), addr.port()).with_id(*id)),
        )
        .response_timeout_millis(response_timeout_millis)
        .build()
        .unwrap()
}

/// An address nothing listens on.
async fn closed_port() -> SocketAddr {
    let (listener, addr) = bind_local().await;
    drop(listener);
    addr
}

fn client_for(config: &BackendServiceConfig, index: usize) -> HyperOriginClient {
    HyperOriginClient::new(config.origins()[index].clone(), config).unwrap()
}

#[tokio::test]
async fn test_forwards_path_and_query() {
    let addr = start_programmable_backend(|head| async move {
        let request_line = head.lines().next().unwrap_or_default().to_string();
        (200, request_line)
    })
    .await;
    let config = service(&[("a", addr)], 1000);
    let client = client_for(&config, 0);

    let request = Request::builder()
        .uri("/shop/basket?item=1")
        .body(Body::empty())
        .unwrap();
    let response = client.handle(request, &InterceptorContext::new()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"GET /shop/basket?item=1 HTTP/1.1");
}

#[tokio::test]
async fn test_error_status_is_a_response() {
    let addr = start_programmable_backend(|_| async { (503, "down".to_string()) }).await;
    let config = service(&[("a", addr)], 1000);
    let client = client_for(&config, 0);

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = client.handle(request, &InterceptorContext::new()).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_connection_refused_is_connect_error() {
    let addr = closed_port().await;
    let config = service(&[("a", addr)], 1000);
    let client = client_for(&config, 0);

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let err = client.handle(request, &InterceptorContext::new()).await.unwrap_err();

    assert_eq!(err.kind, TransportErrorKind::Connect);
    assert_eq!(err.origin_id, "a");
}

#[tokio::test]
async fn test_silent_origin_times_out() {
    let addr = start_silent_backend().await;
    let config = service(&[("a", addr)], 100);
    let client = client_for(&config, 0);

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let err = client.handle(request, &InterceptorContext::new()).await.unwrap_err();

    assert_eq!(err.kind, TransportErrorKind::Timeout);
}

#[tokio::test]
async fn test_connection_cap_enforced() {
    let addr = start_silent_backend().await;
    let config = service(&[("a", addr)], 5000)
        .to_builder()
        .connection_pool(ConnectionPoolSettings {
            max_connections_per_host: 1,
            max_pending_connections_per_host: 0,
            ..ConnectionPoolSettings::default()
        })
        .build()
        .unwrap();
    let client = Arc::new(client_for(&config, 0));

    let in_flight = {
        let client = client.clone();
        tokio::spawn(async move {
            let request = Request::builder().uri("/slow").body(Body::empty()).unwrap();
            client.handle(request, &InterceptorContext::new()).await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.limiter().in_flight(), 1);

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let err = client.handle(request, &InterceptorContext::new()).await.unwrap_err();
    assert_eq!(err.kind, TransportErrorKind::PoolExhausted);

    in_flight.abort();
    let _ = in_flight.await;
    assert_eq!(client.limiter().in_flight(), 0);
}

#[tokio::test]
async fn test_dispatch_fails_over_to_live_origin() {
    let dead = closed_port().await;
    let live = start_programmable_backend(|_| async { (200, "live".to_string()) }).await;
    let config = service(&[("dead", dead), ("live", live)], 1000);

    let hosts = config
        .origins()
        .iter()
        .map(|origin| {
            let client = HyperOriginClient::new(origin.clone(), &config).unwrap();
            RemoteHost::new(origin.clone(), Arc::new(client))
        })
        .collect();
    let policy = RecordingPolicy::retry_while_below(2);

    let dispatcher = RequestDispatcher::builder(Arc::new(config), FakeLoadBalancer::new(hosts), policy.clone())
        .build()
        .unwrap();

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = dispatcher.dispatch(request, &InterceptorContext::new()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-styx-origin-id").unwrap(), "live");
    assert!(policy.seen()[0].previous.is_empty());
    assert_eq!(policy.seen()[0].avoid, vec!["dead"]);
}
