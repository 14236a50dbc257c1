//! Demo IPC server.
//!
//! Registers a small `services` namespace and listens on a Unix domain
//! socket until interrupted. Pair it with `ipcall-demo-client`.

use anyhow::Result;
use clap::Parser;
use ipcall::{Handler, Methods, Server, ServerEvent};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "ipcall-demo-server")]
#[command(about = "Demo JSON-RPC server over a Unix domain socket")]
struct Args {
    /// Socket path to listen on
    #[arg(short, long, default_value = "/tmp/ipcall-demo.sock")]
    socket: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn first_string(params: &[Value], fallback: &str) -> String {
    params
        .first()
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let methods = Methods::new().namespace(
        "services",
        Methods::new()
            .handler(
                "hello",
                Handler::sync(|params| Ok(json!(first_string(&params, "hello")))),
            )
            .handler(
                "hello_delayed",
                Handler::deferred(|params| async move {
                    tokio::time::sleep(Duration::from_millis(1000)).await;
                    Ok(json!(first_string(&params, "hello")))
                }),
            ),
    );

    let server = Server::new(&args.socket, methods)?;

    // Log the server's notifications out of band.
    let mut events = server.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ServerEvent::Request(request) => info!("request for {}", request.method),
                other => info!("server event: {:?}", other),
            }
        }
    });

    server.listen().await?;
    info!("listening on {:?}, press Ctrl-C to stop", args.socket);

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    server.close().await?;

    Ok(())
}
