use currency_rates::{
    ErrorKind, ExchangeError, FetchOrchestrator, HttpRateFetcher, RateCache, RateFetcher,
    RequestLimiter, RetryPolicy,
};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

const CANONICAL_BODY: &str = r#"{"conversion_rates":{"USD":1.0,"EUR":0.85},"base_code":"USD"}"#;

/// Serves the same canned response to every connection. Returns the base URL
/// and a counter of requests served.
async fn serve(status: &'static str, body: &'static str) -> (String, Arc<AtomicUsize>) {
    serve_raw(format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    ))
    .await
}

/// Writes `response` verbatim to every connection, then closes it.
async fn serve_raw(response: String) -> (String, Arc<AtomicUsize>) {
    let response: Arc<str> = response.into();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let response = Arc::clone(&response);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut read = 0;
                while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf[read..]).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => read += n,
                    }
                    if read == buf.len() {
                        break;
                    }
                }
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{}", addr), hits)
}

fn fetcher() -> HttpRateFetcher {
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    HttpRateFetcher::with_client(client)
}

#[tokio::test]
async fn test_fetch_canonical_response() {
    let (url, _) = serve("200 OK", CANONICAL_BODY).await;

    let snapshot = fetcher().fetch(&url).await.unwrap();

    assert_eq!(snapshot.base_code(), "USD");
    assert_eq!(snapshot.rates()["USD"], 1.0);
    assert_eq!(snapshot.rates()["EUR"], 0.85);
}

#[tokio::test]
async fn test_fetch_legacy_response() {
    let (url, _) = serve(
        "200 OK",
        r#"{"base":"USD","date":"2024-03-01","rates":{"USD":1.0,"JPY":149.5}}"#,
    )
    .await;

    let snapshot = fetcher().fetch(&url).await.unwrap();

    assert_eq!(snapshot.base_code(), "USD");
    assert_eq!(snapshot.rates()["JPY"], 149.5);
}

#[tokio::test]
async fn test_fetch_non_200_status() {
    let (url, _) = serve("500 Internal Server Error", r#"{"error":"boom"}"#).await;

    let err = fetcher().fetch(&url).await.unwrap_err();

    assert_eq!(err, ExchangeError::UnexpectedStatus { code: 500 });
}

#[tokio::test]
async fn test_fetch_forbidden_status() {
    let (url, _) = serve("403 Forbidden", r#"{"result":"error"}"#).await;

    let err = fetcher().fetch(&url).await.unwrap_err();

    assert_eq!(err, ExchangeError::UnexpectedStatus { code: 403 });
}

#[tokio::test]
async fn test_fetch_malformed_body() {
    let (url, _) = serve("200 OK", "<html>maintenance</html>").await;

    let err = fetcher().fetch(&url).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[tokio::test]
async fn test_fetch_schema_mismatch() {
    let (url, _) = serve("200 OK", r#"{"result":"success","data":[1,2,3]}"#).await;

    let err = fetcher().fetch(&url).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[tokio::test]
async fn test_fetch_truncated_body() {
    let response = concat!(
        "HTTP/1.1 200 OK\r\n",
        "Content-Type: application/json\r\n",
        "Content-Length: 500\r\n\r\n",
        r#"{"base_code":"USD","#,
    );
    let (url, _) = serve_raw(response.to_string()).await;

    let err = fetcher().fetch(&url).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_fetch_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = fetcher()
        .fetch(&format!("http://{}", addr))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_fetch_and_convert() {
    let (url, _) = serve("200 OK", CANONICAL_BODY).await;
    let orchestrator = FetchOrchestrator::new(
        Arc::new(fetcher()),
        Arc::new(RateCache::default()),
        Arc::new(RequestLimiter::default()),
    );

    let rates = orchestrator.get_exchange_rates(&url).await.unwrap();

    assert!(!rates.from_cache);
    assert_eq!(rates.convert(100.0, "USD", "EUR").unwrap(), 85.0);
    assert!(orchestrator.cache().read().is_some());
}

#[tokio::test]
async fn test_limiter_shields_upstream() {
    let (url, hits) = serve("200 OK", CANONICAL_BODY).await;
    let orchestrator = FetchOrchestrator::new(
        Arc::new(fetcher()),
        Arc::new(RateCache::default()),
        Arc::new(RequestLimiter::new(2)),
    );

    for _ in 0..2 {
        assert!(!orchestrator.get_exchange_rates(&url).await.unwrap().from_cache);
    }
    for _ in 0..3 {
        let rates = orchestrator.get_exchange_rates(&url).await.unwrap();
        assert!(rates.from_cache);
        assert_eq!(rates.rates()["EUR"], 0.85);
    }

    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_persistent_failure_surfaces_status() {
    let (url, hits) = serve("503 Service Unavailable", "").await;
    let orchestrator = FetchOrchestrator::new(
        Arc::new(fetcher()),
        Arc::new(RateCache::default()),
        Arc::new(RequestLimiter::default()),
    )
    .with_policy(RetryPolicy {
        max_attempts: 2,
        fetch_timeout: Duration::from_secs(5),
    });

    let err = orchestrator.get_exchange_rates(&url).await.unwrap_err();

    assert_eq!(err, ExchangeError::UnexpectedStatus { code: 503 });
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}
