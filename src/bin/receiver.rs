use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use anyhow::Context;
use clap::Parser;
use tracing::Level;

use gobackn::config::{FaultConfig, ReceiverConfig};
use gobackn::receiver::Receiver;
use gobackn::records::FileSink;

/// Listens for one session of Start / Data / Stop frames, acknowledging
///  cumulatively, and writes the accepted records to the output file.
#[derive(Parser, Debug)]
struct Args {
    /// host to bind
    #[arg(long, default_value = "localhost")]
    address: String,

    /// port to bind
    #[arg(long, default_value_t = 10000)]
    port: u16,

    /// output file for the accepted records
    #[arg(long, default_value = "receive.txt")]
    output: PathBuf,

    /// ack value whose reply is corrupted once per session
    #[arg(long, default_value_t = 2)]
    corrupt_ack_at: u64,

    /// ack value whose reply is dropped once per session
    #[arg(long, default_value_t = 8)]
    suppress_reply_at: u64,

    /// run without any fault injection on the reply path
    #[arg(long)]
    no_faults: bool,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .try_init()
        .ok();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let bind_addr: SocketAddr = (args.address.as_str(), args.port)
        .to_socket_addrs()?
        .next()
        .with_context(|| format!("cannot resolve {}:{}", args.address, args.port))?;

    let faults = if args.no_faults {
        None
    }
    else {
        Some(FaultConfig {
            corrupt_ack_trigger: args.corrupt_ack_at,
            suppress_reply_trigger: args.suppress_reply_at,
            ..FaultConfig::default()
        })
    };

    let config = ReceiverConfig { bind_addr, faults };
    let sink = Box::new(FileSink::new(args.output));

    let mut receiver = Receiver::bind(config, sink).await?;
    receiver.run_session().await
}
