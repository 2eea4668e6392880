#![forbid(unsafe_code)]

use objrpc::{HttpServerClient, Router, StreamServerClient};

fn echo_router() -> Router {
    let mut router = Router::default();
    router.add_method("Echo.Echo", |req: String| async move { Ok(req) });
    router
}

/// Reserves an ephemeral port so both halves of a pair can share one
/// literal address.
async fn reserve_addr() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

#[tokio::test]
async fn test_stream_pair() {
    let addr = reserve_addr().await;
    let pair = StreamServerClient::new(echo_router(), addr.clone(), addr);

    pair.server.start().await.unwrap();
    pair.client.connect().await.unwrap();

    let rsp: String = pair
        .client
        .call("Echo.Echo", &"paired".to_string())
        .await
        .unwrap();
    assert_eq!(rsp, "paired");

    pair.client.disconnect().await.unwrap();
    pair.server.stop().await.unwrap();
    pair.server.wait().await;
}

#[tokio::test]
async fn test_http_pair() {
    let addr = reserve_addr().await;
    let pair = HttpServerClient::new(echo_router(), addr.clone(), addr);

    pair.server.start().await.unwrap();
    pair.client.connect().await.unwrap();

    let rsp: String = pair
        .client
        .call("Echo.Echo", &"paired".to_string())
        .await
        .unwrap();
    assert_eq!(rsp, "paired");

    pair.client.disconnect().await.unwrap();
    pair.server.stop().await.unwrap();
    pair.server.wait().await;
}
