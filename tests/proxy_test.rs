//! End-to-end tests: real backends, real balancer, real HTTP client.

mod common;

use std::time::{Duration, Instant};

use common::{
    dead_backend, get, start_backend, start_proxy, start_streaming_backend, SEEN_FORWARDED_FOR,
};

fn route(name: &str, mode: &str, backends: &[std::net::SocketAddr]) -> String {
    let backends = backends
        .iter()
        .map(|a| format!("\"http://{}\"", a))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"
        [[routes]]
        name = "{name}"
        balance_mode = "{mode}"
        backends = [{backends}]
        "#
    )
}

#[tokio::test]
async fn test_round_robin_distributes_across_backends() {
    let a = start_backend("a").await;
    let b = start_backend("b").await;
    let proxy = start_proxy(&route("web", "round-robin", &[a, b])).await;
    let client = reqwest::Client::new();

    let mut bodies = Vec::new();
    for _ in 0..4 {
        let (status, body) = get(&client, &proxy.url("/hello")).await;
        assert_eq!(status, 200);
        bodies.push(body);
    }
    assert_eq!(bodies, vec!["a /hello", "b /hello", "a /hello", "b /hello"]);
}

#[tokio::test]
async fn test_ip_hash_is_sticky_per_client() {
    let a = start_backend("a").await;
    let b = start_backend("b").await;
    let c = start_backend("c").await;
    let proxy = start_proxy(&route("web", "ip-hash", &[a, b, c])).await;
    let client = reqwest::Client::new();

    let mut seen = Vec::new();
    for _ in 0..5 {
        let body = client
            .get(proxy.url("/"))
            .header("x-forwarded-for", "10.1.2.3")
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        seen.push(body);
    }
    seen.dedup();
    assert_eq!(seen.len(), 1);
}

#[tokio::test]
async fn test_every_strategy_serves_traffic() {
    let a = start_backend("a").await;
    let b = start_backend("b").await;
    let client = reqwest::Client::new();

    for mode in ["round-robin", "random", "ip-hash", "least-load", "p2c", "p2c-ewma"] {
        let proxy = start_proxy(&route("web", mode, &[a, b])).await;
        for _ in 0..4 {
            let (status, body) = get(&client, &proxy.url("/x")).await;
            assert_eq!(status, 200, "strategy {}", mode);
            assert!(body == "a /x" || body == "b /x", "strategy {}: {}", mode, body);
        }
    }
}

#[tokio::test]
async fn test_unmatched_route_is_404() {
    let a = start_backend("a").await;
    let config = format!(
        r#"
        [[routes]]
        name = "api"
        path_prefix = "/api"
        backends = ["http://{a}"]
        "#
    );
    let proxy = start_proxy(&config).await;
    let client = reqwest::Client::new();

    assert_eq!(get(&client, &proxy.url("/api/users")).await.0, 200);
    assert_eq!(get(&client, &proxy.url("/other")).await.0, 404);
}

#[tokio::test]
async fn test_upstream_failure_is_502() {
    let dead = dead_backend().await;
    let proxy = start_proxy(&route("web", "round-robin", &[dead])).await;
    let client = reqwest::Client::new();

    assert_eq!(get(&client, &proxy.url("/")).await.0, 502);
}

#[tokio::test]
async fn test_blacklisted_client_is_403() {
    let a = start_backend("a").await;
    let config = format!(
        r#"
        [[routes]]
        name = "web"
        backends = ["http://{a}"]

        [routes.admission]
        ip_blacklist = ["10.6.6.6"]
        "#
    );
    let proxy = start_proxy(&config).await;
    let client = reqwest::Client::new();

    let blocked = client
        .get(proxy.url("/"))
        .header("x-forwarded-for", "10.6.6.6")
        .send()
        .await
        .unwrap();
    assert_eq!(blocked.status().as_u16(), 403);

    assert_eq!(get(&client, &proxy.url("/")).await.0, 200);
}

#[tokio::test]
async fn test_socket_peer_is_blacklisted_without_headers() {
    let a = start_backend("a").await;
    let config = format!(
        r#"
        [[routes]]
        name = "web"
        backends = ["http://{a}"]

        [routes.admission]
        ip_blacklist = ["127.0.0.1"]
        "#
    );
    let proxy = start_proxy(&config).await;
    let client = reqwest::Client::new();

    assert_eq!(get(&client, &proxy.url("/")).await.0, 403);
}

#[tokio::test]
async fn test_token_bucket_returns_429_when_empty() {
    let a = start_backend("a").await;
    let config = format!(
        r#"
        [[routes]]
        name = "web"
        backends = ["http://{a}"]

        [routes.admission.token_bucket]
        enabled = true
        capacity = 2
        rate = 1
        "#
    );
    let proxy = start_proxy(&config).await;
    let client = reqwest::Client::new();

    assert_eq!(get(&client, &proxy.url("/")).await.0, 200);
    assert_eq!(get(&client, &proxy.url("/")).await.0, 200);
    let (status, body) = get(&client, &proxy.url("/")).await;
    assert_eq!(status, 429);
    assert_eq!(body, "Too Many Requests");
}

#[tokio::test]
async fn test_leaky_bucket_serves_after_delay() {
    let a = start_backend("a").await;
    let config = format!(
        r#"
        [[routes]]
        name = "web"
        backends = ["http://{a}"]

        [routes.admission.leaky_bucket]
        enabled = true
        capacity = 4
        interval_ms = 200
        "#
    );
    let proxy = start_proxy(&config).await;
    let client = reqwest::Client::new();

    let url_one = proxy.url("/one");
    let url_two = proxy.url("/two");
    let started = Instant::now();
    let (first, second) = tokio::join!(
        get(&client, &url_one),
        get(&client, &url_two),
    );
    assert_eq!(first.0, 200);
    assert_eq!(second.0, 200);
    assert!(started.elapsed() >= Duration::from_millis(350));
}

#[tokio::test]
async fn test_forwarding_headers() {
    let a = start_backend("a").await;
    let proxy = start_proxy(&route("web", "round-robin", &[a])).await;
    let client = reqwest::Client::new();

    let plain = client.get(proxy.url("/")).send().await.unwrap();
    assert_eq!(plain.headers()[SEEN_FORWARDED_FOR], "127.0.0.1");
    assert!(plain.headers().contains_key("x-request-id"));

    let chained = client
        .get(proxy.url("/"))
        .header("x-forwarded-for", "203.0.113.9")
        .header("x-request-id", "trace-me")
        .send()
        .await
        .unwrap();
    assert_eq!(chained.headers()[SEEN_FORWARDED_FOR], "203.0.113.9, 127.0.0.1");
    assert_eq!(chained.headers()["x-request-id"], "trace-me");
}

#[tokio::test]
async fn test_backend_stays_busy_while_body_streams() {
    let slow = start_streaming_backend("slow ", "done", Duration::from_millis(800)).await;
    let fast = start_backend("fast").await;
    let proxy = start_proxy(&route("web", "least-load", &[slow, fast])).await;
    let client = reqwest::Client::new();

    // Ties go to the first host, so the first request lands on the slow one.
    let first = client.get(proxy.url("/")).send().await.unwrap();
    assert_eq!(first.status().as_u16(), 200);

    let (status, second) = get(&client, &proxy.url("/")).await;
    assert_eq!(status, 200);
    assert_eq!(second, "fast /");

    assert_eq!(first.text().await.unwrap(), "slow done");

    // Both bodies are finished, so the slow host is idle again.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let (_, third) = get(&client, &proxy.url("/")).await;
    assert_eq!(third, "slow done");
}

#[tokio::test]
async fn test_gate_counts_requests_until_body_ends() {
    let slow = start_streaming_backend("slow ", "done", Duration::from_millis(600)).await;
    let config = format!(
        r#"
        [[routes]]
        name = "web"
        backends = ["http://{slow}"]

        [routes.admission]
        max_allowed = 1
        "#
    );
    let proxy = start_proxy(&config).await;
    let client = reqwest::Client::new();

    let started = Instant::now();
    let first = client.get(proxy.url("/")).send().await.unwrap();
    let (status, second) = get(&client, &proxy.url("/")).await;
    assert_eq!(status, 200);
    assert_eq!(second, "slow done");
    // The second request waited for the first body to finish and then
    // streamed its own.
    assert!(started.elapsed() >= Duration::from_millis(1100));
    assert_eq!(first.text().await.unwrap(), "slow done");
}
