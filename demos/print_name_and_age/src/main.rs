//! Worked example mirroring the original `print_name_and_age` server:
//! registers one RPC handler and loops driving the event loop until
//! interrupted.

use std::{
    net::Ipv4Addr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use clap::Parser;
use dstc::{Config, Runtime};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Registers print_name_and_age and prints every call it receives")]
struct Args {
    /// Multicast group address; both group_addr and group_port must be set
    /// together to override the default.
    #[arg(long, env = "DSTC_GROUP_ADDR")]
    group_addr: Option<Ipv4Addr>,

    #[arg(long, env = "DSTC_GROUP_PORT")]
    group_port: Option<u16>,

    #[arg(long, env = "DSTC_NODE_ID")]
    node_id: Option<u64>,
}

/// Wire layout matches the original example's `DSTC_SERVER(print_name_and_age, char, [32], int,)`:
/// a 32-byte NUL-padded name followed by a little-endian `i32` age.
#[dstc::dstc_server]
fn print_name_and_age(node_id: u64, args: &[u8]) {
    if args.len() < 36 {
        tracing::warn!(node_id, len = args.len(), "print_name_and_age call too short, dropping");
        return;
    }
    let name_bytes = &args[..32];
    let name_end = name_bytes.iter().position(|&b| b == 0).unwrap_or(32);
    let name = String::from_utf8_lossy(&name_bytes[..name_end]);
    let age = i32::from_le_bytes(args[32..36].try_into().expect("slice of 4 bytes"));

    println!("Name: {name}");
    println!("Age:  {age}");
    tracing::info!(node_id, name = %name, age, "print_name_and_age invoked");
}

dstc::register_all!(register_all => [print_name_and_age]);

fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut config = Config::default();
    if let Some(node_id) = args.node_id {
        config = config.with_node_id(node_id);
    }
    if let (Some(addr), Some(port)) = (args.group_addr, args.group_port) {
        config = config.with_group(addr, port);
    }

    let mut rt = Runtime::bind(config).unwrap_or_else(|e| {
        tracing::error!("failed to bind transport: {e}");
        std::process::exit(1);
    });
    register_all(&mut rt);

    let running = Arc::new(AtomicBool::new(true));
    let handler_running = running.clone();
    ctrlc::set_handler(move || handler_running.store(false, Ordering::SeqCst))
        .expect("failed to install Ctrl-C handler");

    tracing::info!(node_id = rt.get_node_id(), "print_name_and_age server listening");
    while running.load(Ordering::SeqCst) {
        rt.process_events(Some(200_000));
    }
}
