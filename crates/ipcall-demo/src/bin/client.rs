//! Demo IPC client.
//!
//! Exercises the three calling styles against `ipcall-demo-server`: the
//! convenience form, the verbose fully-formed-request form, and the callback
//! adapter.

use anyhow::Result;
use clap::Parser;
use ipcall::{Client, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "ipcall-demo-client")]
#[command(about = "Demo JSON-RPC client over a Unix domain socket")]
struct Args {
    /// Socket path of the demo server
    #[arg(short, long, default_value = "/tmp/ipcall-demo.sock")]
    socket: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
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

    let client = Client::new(&args.socket)?;

    // Convenience form: method name plus positional arguments.
    let convenient = client
        .call("services.hello", vec![json!("convenient example string")])
        .await?;
    info!("convenient call returned: {}", convenient);

    // Verbose form: a fully-formed request passes through unchanged.
    let verbose = client
        .call_request(Request {
            jsonrpc: "2.0".to_string(),
            method: "services.hello".to_string(),
            params: Some(json!(["verbose example string"])),
            id: Some(json!(1)),
        })
        .await?;
    info!("verbose call returned: {}", verbose);

    // No arguments: the handler falls back to its default.
    let no_arguments = client.call("services.hello", vec![]).await?;
    info!("no-argument call returned: {}", no_arguments);

    // Callback adapter over the same engine.
    let (tx, rx) = tokio::sync::oneshot::channel();
    client.call_with_callback(
        "services.hello_delayed",
        vec![json!("delayed")],
        move |outcome| {
            let _ = tx.send(outcome);
        },
    );
    match rx.await? {
        Ok(value) => info!("delayed call returned: {}", value),
        Err(err) => info!("delayed call failed: {}", err),
    }

    Ok(())
}
