use clap::Parser;
use objrpc::{ClientConfig, HttpClient, StreamClient};
use objrpc_demo::{Request, Transport};

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
struct Args {
    /// Server address.
    #[arg(default_value = "127.0.0.1:8000")]
    addr: String,

    /// Transport binding.
    #[arg(long, value_enum, default_value = "stream")]
    transport: Transport,

    /// Request value.
    #[arg(short, long, default_value = "alice")]
    value: String,

    /// Use MessagePack instead of JSON.
    #[arg(long, default_value_t = false)]
    use_msgpack: bool,
}

#[tokio::main]
async fn main() -> objrpc::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = ClientConfig {
        use_msgpack: args.use_msgpack,
    };
    let request = Request(args.value.clone());

    match args.transport {
        Transport::Stream => {
            let client = StreamClient::with_config(args.addr, config);
            client.connect().await?;
            let echoed: String = client.call("Demo.Echo", &request).await?;
            let greeted: String = client.call("Demo.Greet", &request).await?;
            tracing::info!("echo: {echoed}, greet: {greeted}");
            client.disconnect().await?;
        }
        Transport::Http => {
            let client = HttpClient::with_config(args.addr, config);
            client.connect().await?;
            let echoed: String = client.call("Demo.Echo", &request).await?;
            let greeted: String = client.call("Demo.Greet", &request).await?;
            tracing::info!("echo: {echoed}, greet: {greeted}");
            client.disconnect().await?;
        }
    }
    Ok(())
}
