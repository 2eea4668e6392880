use clap::Parser;
use objrpc::{HttpServer, StreamServer};
use objrpc_demo::{Transport, demo_router};

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
struct Args {
    /// Listen address.
    #[arg(default_value = "127.0.0.1:8000")]
    addr: String,

    /// Transport binding.
    #[arg(long, value_enum, default_value = "stream")]
    transport: Transport,
}

#[tokio::main]
async fn main() -> objrpc::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    match args.transport {
        Transport::Stream => {
            let server = StreamServer::new(demo_router(), args.addr);
            let addr = server.start().await?;
            tracing::info!("serving Demo.Echo and Demo.Greet on {addr}");

            tokio::signal::ctrl_c().await.ok();
            server.stop().await?;
            server.wait().await;
        }
        Transport::Http => {
            let server = HttpServer::new(demo_router(), args.addr);
            let addr = server.start().await?;
            tracing::info!("serving Demo.Echo and Demo.Greet on http://{addr}");

            tokio::signal::ctrl_c().await.ok();
            server.stop().await?;
            server.wait().await;
        }
    }
    Ok(())
}
