use clap::Parser;
use fluxedge::{EdgeBuilder, Poller};
use fluxedge_proto::MacAddr;
use std::net::Ipv4Addr;
use std::process;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Answer ARP and ping for a virtual IPv4 address on a raw interface.
#[derive(Parser, Debug)]
#[command(name = "fluxedge", version)]
struct Args {
    /// Interface to bind, e.g. eth0
    interface: String,

    /// IPv4 address to claim
    ip: Ipv4Addr,

    /// Use this MAC instead of the interface's own
    #[arg(long)]
    mac: Option<MacAddr>,

    #[arg(long, default_value_t = 0)]
    rx_core: usize,

    #[arg(long, default_value_t = 1)]
    announce_core: usize,

    /// Seconds between gratuitous ARPs
    #[arg(long, default_value_t = 60)]
    interval_secs: u64,

    #[arg(long, default_value_t = fluxedge::config::BURST_SIZE)]
    burst: usize,

    /// Frames in the buffer pool
    #[arg(long, default_value_t = fluxedge::config::DEFAULT_FRAME_COUNT)]
    frames: u32,

    /// Never sleep between empty polls
    #[arg(long)]
    busy_poll: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_thread_names(true).init();

    let mut builder = EdgeBuilder::new(&args.interface, args.ip)
        .rx_core(args.rx_core)
        .announce_core(args.announce_core)
        .announce_interval(Duration::from_secs(args.interval_secs))
        .burst_size(args.burst)
        .frames(args.frames)
        .poller(if args.busy_poll { Poller::Busy } else { Poller::Adaptive });
    if let Some(mac) = args.mac {
        builder = builder.mac(mac);
    }

    let edge = match builder.build_packet() {
        Ok(edge) => edge,
        Err(e) => {
            error!(interface = %args.interface, error = %e, "setup failed");
            process::exit(1);
        }
    };

    info!(identity = %edge.identity(), "responding");

    let handle = match edge.spawn() {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "failed to start threads");
            process::exit(1);
        }
    };

    // Runs until the process is killed
    handle.join();
}
