use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;
use anyhow::Context;
use clap::Parser;
use tracing::{info, Level};

use gobackn::config::SenderConfig;
use gobackn::records::read_records;
use gobackn::sender::{build_outbound, SendWindow, Sender, SessionOutcome};

/// Transmits the records from the input file to the receiver, one session of
///  Start / Data / Stop frames with Go-Back-N retransmission.
#[derive(Parser, Debug)]
struct Args {
    /// host the receiver listens on
    #[arg(long, default_value = "localhost")]
    address: String,

    /// port the receiver listens on
    #[arg(long, default_value_t = 10000)]
    port: u16,

    /// maximum number of outstanding unacknowledged frames
    #[arg(long, default_value_t = 5)]
    window_size: usize,

    /// seconds to wait for a reply before re-sending the window
    #[arg(long, default_value_t = 2)]
    timeout_seconds: u64,

    /// consecutive timeouts after which the session is abandoned
    #[arg(long, default_value_t = 3)]
    max_timeouts: u32,

    /// input file, one record per line
    #[arg(long, default_value = "transmit.txt")]
    input: PathBuf,
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

    let peer_addr: SocketAddr = (args.address.as_str(), args.port)
        .to_socket_addrs()?
        .next()
        .with_context(|| format!("cannot resolve {}:{}", args.address, args.port))?;

    let config = SenderConfig {
        peer_addr,
        window_size: args.window_size,
        timeout_after: Duration::from_secs(args.timeout_seconds),
        max_consecutive_timeouts: args.max_timeouts,
    };

    let records = read_records(&args.input)?;
    info!("transmitting {} records to {}", records.len(), peer_addr);

    let mut window = SendWindow::new(
        build_outbound(records),
        config.window_size,
        config.max_consecutive_timeouts,
    );
    let sender = Sender::bind(config).await?;

    match sender.run_session(&mut window).await? {
        SessionOutcome::Completed => Ok(()),
        SessionOutcome::AbortedMaxTimeouts => {
            anyhow::bail!("session abandoned after too many consecutive timeouts")
        }
    }
}
