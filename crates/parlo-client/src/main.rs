use anyhow::Result;
use clap::Parser;
use tracing::error;

use parlo_client::{run_call, CallConfig};

#[derive(Parser, Debug)]
#[command(name = "parlo-client", about = "Peer-to-peer audio call client")]
struct Args {
    /// Signaling relay to negotiate through.
    #[arg(long, default_value = "ws://127.0.0.1:9000")]
    relay: String,

    /// Send a generated tone instead of microphone audio.
    #[arg(long, default_value = "false")]
    tone: bool,

    /// Discard remote audio instead of playing it.
    #[arg(long, default_value = "false")]
    mute: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    parlo_core::init_tracing();

    let args = Args::parse();
    let config = CallConfig {
        relay_url: args.relay,
        tone: args.tone,
        mute: args.mute,
    };

    if let Err(e) = run_call(config).await {
        error!("call attempt failed: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
