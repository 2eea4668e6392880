#![forbid(unsafe_code)]

use std::time::Duration;

use objrpc::{
    ClientConfig, DEFAULT_METHODS_PATH, Error, ErrorKind, HttpClient, HttpServer, Router,
    RunState,
};
use tokio::time::timeout;

fn echo_router() -> Router {
    let mut router = Router::default();
    router.add_method("Echo.Echo", |req: String| async move { Ok(req) });
    router.add_method("Echo.Fail", |_: String| async move {
        Err::<String, _>(Error::new(ErrorKind::InvalidArgument, "rejected".into()))
    });
    router
}

#[tokio::test]
async fn test_round_trip() {
    let _ = tracing_subscriber::fmt().try_init();

    let server = HttpServer::new(echo_router(), "127.0.0.1:0");
    let addr = server.start().await.unwrap();

    let client = HttpClient::new(addr.to_string());
    client.connect().await.unwrap();
    let rsp: String = client.call("Echo.Echo", &"hello".to_string()).await.unwrap();
    assert_eq!(rsp, "hello");
    client.disconnect().await.unwrap();

    server.stop().await.unwrap();
    server.wait().await;
    assert_eq!(server.state().await, RunState::Stopped);
}

#[tokio::test]
async fn test_msgpack_round_trip() {
    let server = HttpServer::new(echo_router(), "127.0.0.1:0");
    let addr = server.start().await.unwrap();

    let client = HttpClient::with_config(addr.to_string(), ClientConfig { use_msgpack: true });
    client.connect().await.unwrap();
    let rsp: String = client.call("Echo.Echo", &"packed".to_string()).await.unwrap();
    assert_eq!(rsp, "packed");
    client.disconnect().await.unwrap();

    server.stop().await.unwrap();
    server.wait().await;
}

#[tokio::test]
async fn test_graceful_stop() {
    let server = HttpServer::new(echo_router(), "127.0.0.1:0");
    server.start().await.unwrap();

    // stop blocks until the serve loop has confirmed shutdown
    server.stop().await.unwrap();
    assert_eq!(server.state().await, RunState::Stopped);
    timeout(Duration::from_secs(1), server.wait()).await.unwrap();

    let err = server.stop().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotRunning);
}

#[tokio::test]
async fn test_lifecycle_misuse() {
    let server = HttpServer::new(Router::default(), "127.0.0.1:0");

    let err = server.stop().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotRunning);
    timeout(Duration::from_secs(1), server.wait()).await.unwrap();

    server.start().await.unwrap();
    let err = server.start().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::AlreadyRunning);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_client_misuse() {
    let server = HttpServer::new(echo_router(), "127.0.0.1:0");
    let addr = server.start().await.unwrap();

    let client = HttpClient::new(addr.to_string());

    let err = client
        .call::<_, String>("Echo.Echo", &"x".to_string())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotConnected);

    client.connect().await.unwrap();
    let err = client.connect().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::AlreadyConnected);
    assert!(client.is_connected().await);

    client.disconnect().await.unwrap();
    let err = client.disconnect().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotConnected);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_dispatch_errors_propagate() {
    let server = HttpServer::new(echo_router(), "127.0.0.1:0");
    let addr = server.start().await.unwrap();

    let client = HttpClient::new(addr.to_string());
    client.connect().await.unwrap();

    let err = client
        .call::<_, String>("Echo.Fail", &"x".to_string())
        .await
        .unwrap_err();
    assert_eq!(err, Error::new(ErrorKind::InvalidArgument, "rejected".into()));

    let err = client
        .call::<_, String>("No.Such", &"x".to_string())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::MethodNotFound);

    client.disconnect().await.unwrap();
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_methods_endpoint() {
    let server = HttpServer::new(echo_router(), "127.0.0.1:0");
    let addr = server.start().await.unwrap();

    let rsp = reqwest::get(format!("http://{addr}{DEFAULT_METHODS_PATH}"))
        .await
        .unwrap();
    assert_eq!(rsp.status(), 200);
    let mut methods: Vec<String> = rsp.json().await.unwrap();
    methods.sort();
    assert_eq!(methods, vec!["Echo.Echo".to_string(), "Echo.Fail".to_string()]);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let server = HttpServer::new(echo_router(), "127.0.0.1:0");
    let addr = server.start().await.unwrap();

    let rsp = reqwest::get(format!("http://{addr}/nonexistent"))
        .await
        .unwrap();
    assert_eq!(rsp.status(), 404);

    // the request path only accepts POST
    let rsp = reqwest::get(format!("http://{addr}/rpc")).await.unwrap();
    assert_eq!(rsp.status(), 405);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let server = HttpServer::new(echo_router(), "127.0.0.1:0");
    let addr = server.start().await.unwrap();

    let client = reqwest::Client::new();
    let rsp = client
        .post(format!("http://{addr}/rpc"))
        .body("not a message body")
        .send()
        .await
        .unwrap();
    assert_eq!(rsp.status(), 400);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_clients() {
    let server = HttpServer::new(echo_router(), "127.0.0.1:0");
    let addr = server.start().await.unwrap();

    let tasks = (0..8)
        .map(|i| {
            let addr = addr.to_string();
            tokio::spawn(async move {
                let client = HttpClient::new(addr);
                client.connect().await.unwrap();
                let req = format!("client {i}");
                let rsp: String = client.call("Echo.Echo", &req).await.unwrap();
                assert_eq!(rsp, req);
                client.disconnect().await.unwrap();
            })
        })
        .collect::<Vec<_>>();
    for task in tasks {
        task.await.unwrap();
    }

    server.stop().await.unwrap();
    server.wait().await;
}
