//! A reliable-multicast RPC runtime: symbol tables, a readiness-driven event
//! loop, and a UDP-multicast reference transport, wired together as the
//! `Runtime` type and the free-function API mirroring it.

pub mod api;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod queue;
pub mod runtime;
pub mod tables;
pub mod timers;

pub use config::Config;
pub use dstc_macros::{dstc_server, register_all};
pub use dstc_transport::{PubTransport, Reactor, SubTransport};
pub use error::DstcError;
pub use runtime::{LoopSignal, Runtime};
pub use tracing;

pub use api::{
    cancel_callback, get_node_id, get_remote_count, get_socket_count, get_timeout_ms, get_timeout_timestamp,
    process_events, process_reactor_event, process_single_event, process_timeout, queue_callback,
    queue_function_call, register_callback, register_local_function, setup, setup_with_config,
};
