//! End-to-end tests: real sockets, mock upstream, gateway in between.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::time::Duration;

use admission_gateway::config::GatewayConfig;
use admission_gateway::{GatewayServer, Shutdown};

mod common;

async fn start_gateway(config: GatewayConfig) -> Shutdown {
    let bind: SocketAddr = config.listener.bind_address.parse().unwrap();
    let server = GatewayServer::new(config).unwrap();
    let listener = tokio::net::TcpListener::bind(bind).await.unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_admitted_requests_reach_upstream() {
    let upstream_addr: SocketAddr = "127.0.0.1:28481".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:28482".parse().unwrap();
    let hits = common::start_mock_upstream(upstream_addr, "hello").await;

    let mut config = GatewayConfig::default();
    config.listener.bind_address = gateway_addr.to_string();
    config.upstream.address = upstream_addr.to_string();
    config.rate_limit.max_requests = 2;
    config.rate_limit.window_secs = 60;
    config.rate_limit.soft_delay_ms = 0;
    let shutdown = start_gateway(config).await;

    let client = client();
    let url = format!("http://{}/api/conversations", gateway_addr);

    for _ in 0..2 {
        let res = client
            .get(&url)
            .header("origin", "http://localhost:3000")
            .send()
            .await
            .expect("Gateway unreachable");
        assert_eq!(res.status(), 200);
        assert!(res.headers().contains_key("x-request-id"));
        assert_eq!(res.headers()["pragma"], "no-cache");
        assert_eq!(
            res.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
        assert_eq!(res.text().await.unwrap(), "hello");
    }

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), 429);
    assert!(res.headers().contains_key("retry-after"));

    // Rejected requests never touch the upstream.
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    shutdown.trigger();
}

#[tokio::test]
async fn test_preflight_and_health() {
    let upstream_addr: SocketAddr = "127.0.0.1:28483".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:28484".parse().unwrap();
    let hits = common::start_mock_upstream(upstream_addr, "hello").await;

    let mut config = GatewayConfig::default();
    config.listener.bind_address = gateway_addr.to_string();
    config.upstream.address = upstream_addr.to_string();
    config.cors.permitted_origins = vec!["https://app.example.com".into()];
    let shutdown = start_gateway(config).await;

    let client = client();
    let res = client
        .request(
            reqwest::Method::OPTIONS,
            format!("http://{}/api/conversations", gateway_addr),
        )
        .header("origin", "https://app.example.com")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers()["access-control-allow-origin"],
        "https://app.example.com"
    );
    assert_eq!(res.headers()["access-control-allow-methods"], "POST");

    let res = client
        .request(
            reqwest::Method::OPTIONS,
            format!("http://{}/api/conversations", gateway_addr),
        )
        .header("origin", "https://evil.example")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    let res = client
        .get(format!("http://{}/healthz", gateway_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "ok");

    assert_eq!(hits.load(Ordering::SeqCst), 0);
    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_down_is_bad_gateway() {
    let gateway_addr: SocketAddr = "127.0.0.1:28486".parse().unwrap();

    let mut config = GatewayConfig::default();
    config.listener.bind_address = gateway_addr.to_string();
    config.upstream.address = "127.0.0.1:28485".to_string();
    config.timeouts.connect_secs = 1;
    let shutdown = start_gateway(config).await;

    let res = client()
        .get(format!("http://{}/api/conversations", gateway_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 502);
    assert_eq!(res.headers()["pragma"], "no-cache");

    shutdown.trigger();
}
