use crate::{HttpClient, HttpServer, Router, StreamClient, StreamServer};

/// One stream server and one stream client bundled under shared
/// construction parameters. Pure composition; each half keeps its own
/// lifecycle.
pub struct StreamServerClient {
    pub server: StreamServer,
    pub client: StreamClient,
}

impl StreamServerClient {
    #[must_use]
    pub fn new(
        router: Router,
        server_addr: impl Into<String>,
        client_addr: impl Into<String>,
    ) -> Self {
        Self {
            server: StreamServer::new(router, server_addr),
            client: StreamClient::new(client_addr),
        }
    }
}

/// The HTTP counterpart of [`StreamServerClient`].
pub struct HttpServerClient {
    pub server: HttpServer,
    pub client: HttpClient,
}

impl HttpServerClient {
    #[must_use]
    pub fn new(
        router: Router,
        server_addr: impl Into<String>,
        client_addr: impl Into<String>,
    ) -> Self {
        Self {
            server: HttpServer::new(router, server_addr),
            client: HttpClient::new(client_addr),
        }
    }
}
