//! End-to-end tests for the tile gateway pipeline.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

mod common;

#[tokio::test]
async fn test_missing_bbox_rejected_before_upstream() {
    let calls = Arc::new(AtomicU32::new(0));
    let c = calls.clone();
    let upstream = common::start_mock_upstream(move |_req| {
        let c = c.clone();
        async move {
            c.fetch_add(1, Ordering::SeqCst);
            (200, "image/png", b"tile".to_vec())
        }
    })
    .await;

    let (base, shutdown) = common::start_gateway(common::test_config(upstream)).await;
    let client = common::test_client();

    let res = client
        .get(format!("{base}/tiles?LAYERS=cadastral"))
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(res.status(), 400);
    assert_eq!(
        res.headers().get("cache-control").unwrap(),
        "no-store"
    );
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Missing BBOX (latMin,lonMin,latMax,lonMax)");
    assert_eq!(calls.load(Ordering::SeqCst), 0, "no upstream call expected");

    shutdown.trigger();
}

#[tokio::test]
async fn test_tile_success_with_cache_headers() {
    let seen = Arc::new(Mutex::new(String::new()));
    let s = seen.clone();
    let upstream = common::start_mock_upstream(move |req| {
        let s = s.clone();
        async move {
            *s.lock().unwrap() = req;
            (200, "image/png", b"\x89PNG...".to_vec())
        }
    })
    .await;

    let (base, shutdown) = common::start_gateway(common::test_config(upstream)).await;
    let client = common::test_client();

    let res = client
        .get(format!("{base}/tiles?BBOX=10,45,11,46"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers().get("cache-control").unwrap(),
        "public, max-age=3600, stale-while-revalidate=86400"
    );
    assert_eq!(res.headers().get("content-type").unwrap(), "image/png");
    assert_eq!(res.headers().get("vary").unwrap(), "Accept, Referer");
    assert_eq!(res.headers().get("access-control-allow-origin").unwrap(), "*");
    assert_eq!(res.bytes().await.unwrap().as_ref(), b"\x89PNG...");

    // The upstream saw the defaults merged in, with the FORMAT slash literal
    // and the BBOX commas percent-encoded.
    let request = seen.lock().unwrap().clone();
    assert!(request.contains("SERVICE=WMS"), "got: {request}");
    assert!(request.contains("FORMAT=image/png"), "got: {request}");
    assert!(request.contains("BBOX=10%2C45%2C11%2C46"), "got: {request}");
    assert!(request.contains("WIDTH=512"), "got: {request}");

    shutdown.trigger();
}

#[tokio::test]
async fn test_referer_overridden_toward_upstream() {
    let seen = Arc::new(Mutex::new(String::new()));
    let s = seen.clone();
    let upstream = common::start_mock_upstream(move |req| {
        let s = s.clone();
        async move {
            *s.lock().unwrap() = req;
            (200, "image/png", b"tile".to_vec())
        }
    })
    .await;

    let (base, shutdown) = common::start_gateway(common::test_config(upstream)).await;
    let client = common::test_client();

    client
        .get(format!("{base}/tiles?BBOX=10,45,11,46"))
        .header("referer", "https://somewhere-else.example/")
        .header("cookie", "session=secret")
        .send()
        .await
        .unwrap();

    let request = seen.lock().unwrap().clone().to_lowercase();
    assert!(
        request.contains("referer: https://kartta.paikkatietoikkuna.fi/"),
        "got: {request}"
    );
    assert!(!request.contains("somewhere-else"), "got: {request}");
    assert!(!request.contains("cookie"), "got: {request}");

    shutdown.trigger();
}

#[tokio::test]
async fn test_transient_failure_retried_once_then_success() {
    let calls = Arc::new(AtomicU32::new(0));
    let c = calls.clone();
    let upstream = common::start_mock_upstream(move |_req| {
        let c = c.clone();
        async move {
            if c.fetch_add(1, Ordering::SeqCst) == 0 {
                (503, "text/plain", b"unavailable".to_vec())
            } else {
                (200, "image/png", b"tile".to_vec())
            }
        }
    })
    .await;

    let (base, shutdown) = common::start_gateway(common::test_config(upstream)).await;
    let client = common::test_client();

    let res = client
        .get(format!("{base}/tiles?BBOX=10,45,11,46"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers().get("cache-control").unwrap(),
        "public, max-age=3600, stale-while-revalidate=86400"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 2, "exactly one retry expected");

    shutdown.trigger();
}

#[tokio::test]
async fn test_transient_failure_surfaced_after_single_retry() {
    let calls = Arc::new(AtomicU32::new(0));
    let c = calls.clone();
    let upstream = common::start_mock_upstream(move |_req| {
        let c = c.clone();
        async move {
            c.fetch_add(1, Ordering::SeqCst);
            (503, "text/plain", b"still down".to_vec())
        }
    })
    .await;

    let (base, shutdown) = common::start_gateway(common::test_config(upstream)).await;
    let client = common::test_client();

    let res = client
        .get(format!("{base}/tiles?BBOX=10,45,11,46"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 503);
    assert_eq!(res.headers().get("cache-control").unwrap(), "no-store");
    assert_eq!(res.headers().get("content-type").unwrap(), "text/plain");
    assert_eq!(calls.load(Ordering::SeqCst), 2, "no second retry expected");

    shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    // Grab a port that nothing listens on.
    let unused = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = unused.local_addr().unwrap();
    drop(unused);

    let (base, shutdown) = common::start_gateway(common::test_config(dead_addr)).await;
    let client = common::test_client();

    let res = client
        .get(format!("{base}/tiles?BBOX=10,45,11,46"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 502);
    assert!(res.headers().get("cache-control").is_none());
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Upstream map service unreachable");
    assert!(body["detail"].is_string());

    shutdown.trigger();
}

#[tokio::test]
async fn test_debug_echo_instead_of_tile_bytes() {
    let upstream = common::start_mock_upstream(|_req| async {
        (200, "image/png", vec![b'x'; 2000])
    })
    .await;

    let (base, shutdown) = common::start_gateway(common::test_config(upstream)).await;
    let client = common::test_client();

    let res = client
        .get(format!("{base}/tiles?DEBUG=true&BBOX=10,45,11,46"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers().get("cache-control").unwrap(), "public, max-age=60");
    assert_eq!(res.headers().get("content-type").unwrap(), "application/json");

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], 200);
    assert_eq!(body["contentType"], "image/png");
    let target = body["targetUrl"].as_str().unwrap();
    assert!(target.contains("BBOX=10%2C45%2C11%2C46"), "got: {target}");
    assert!(!target.contains("DEBUG"), "got: {target}");
    assert_eq!(body["bodySnippet"].as_str().unwrap().len(), 500);

    shutdown.trigger();
}

#[tokio::test]
async fn test_admission_bounds_concurrent_upstream_calls() {
    let active = Arc::new(AtomicU32::new(0));
    let peak = Arc::new(AtomicU32::new(0));
    let (a, p) = (active.clone(), peak.clone());
    let upstream = common::start_mock_upstream(move |_req| {
        let (a, p) = (a.clone(), p.clone());
        async move {
            let now = a.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(300)).await;
            a.fetch_sub(1, Ordering::SeqCst);
            (200, "image/png", b"tile".to_vec())
        }
    })
    .await;

    let (base, shutdown) = common::start_gateway(common::test_config(upstream)).await;
    let client = common::test_client();

    let mut handles = Vec::new();
    for _ in 0..6 {
        let client = client.clone();
        let url = format!("{base}/tiles?BBOX=10,45,11,46");
        handles.push(tokio::spawn(async move { client.get(url).send().await }));
    }

    for handle in handles {
        let res = handle.await.unwrap().unwrap();
        assert_eq!(res.status(), 200, "queued requests still complete");
    }

    // Default admission capacity is 4; two of the six must have queued.
    assert!(
        peak.load(Ordering::SeqCst) <= 4,
        "peak upstream concurrency {} exceeded admission capacity",
        peak.load(Ordering::SeqCst)
    );

    shutdown.trigger();
}
