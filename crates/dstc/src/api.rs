//! Free-function API surface over a process-wide default `Runtime`.
//!
//! The default runtime lives behind a lazily-bound
//! `Mutex<Option<Runtime<...>>>` so `setup`/`setup_with_config` can report
//! "busy" on a second call instead of silently rebinding sockets.

use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::{
    config::Config,
    error::DstcError,
    runtime::{LoopSignal, Runtime},
};

type DefaultRuntime = Runtime<dstc_transport::UdpPubTransport, dstc_transport::UdpSubTransport>;

static RUNTIME: Lazy<Mutex<Option<DefaultRuntime>>> = Lazy::new(|| Mutex::new(None));

fn with_runtime<R>(f: impl FnOnce(&mut DefaultRuntime) -> R) -> R {
    let mut guard = RUNTIME.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    if guard.is_none() {
        let rt = Runtime::bind(Config::default())
            .unwrap_or_else(|e| dstc_utils::fatal!("failed to self-initialize default runtime: {e}"));
        *guard = Some(rt);
    }
    f(guard.as_mut().expect("just initialized"))
}

/// Idempotently binds the default runtime with default configuration.
/// Returns `Err(DstcError::Busy)` if it is already bound.
pub fn setup() -> Result<(), DstcError> {
    setup_with_config(Config::default())
}

/// Idempotently binds the default runtime with `config`. Returns
/// `Err(DstcError::Busy)` if it is already bound: setup returns "busy" once
/// ready, it never rebinds.
pub fn setup_with_config(config: Config) -> Result<(), DstcError> {
    let mut guard = RUNTIME.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    if guard.is_some() {
        return Err(DstcError::Busy);
    }
    *guard = Some(Runtime::bind(config)?);
    Ok(())
}

pub fn register_local_function(name: &str, handler: impl Fn(u64, &[u8]) + Send + Sync + 'static) {
    with_runtime(|rt| rt.register_local_function(name, handler));
}

pub fn register_callback(handler: impl FnOnce(u64, &[u8]) + Send + 'static) -> u64 {
    with_runtime(|rt| rt.register_callback(handler))
}

pub fn cancel_callback(token: u64) {
    with_runtime(|rt| rt.cancel_callback(token));
}

pub fn queue_function_call(name: &str, args: &[u8]) -> Result<(), DstcError> {
    with_runtime(|rt| rt.queue_function_call(name, args))
}

pub fn queue_callback(token: u64, args: &[u8]) -> Result<(), DstcError> {
    with_runtime(|rt| rt.queue_callback(token, args))
}

pub fn process_events(timeout_us: Option<u64>) -> LoopSignal {
    with_runtime(|rt| rt.process_events(timeout_us))
}

pub fn process_single_event(timeout_ms: Option<u64>) -> LoopSignal {
    with_runtime(|rt| rt.process_single_event(timeout_ms))
}

pub fn process_timeout() {
    with_runtime(Runtime::process_timeout);
}

pub fn process_reactor_event() {
    with_runtime(Runtime::process_reactor_event);
}

pub fn get_socket_count() -> usize {
    with_runtime(|rt| rt.get_socket_count())
}

pub fn get_node_id() -> u64 {
    with_runtime(|rt| rt.get_node_id())
}

pub fn get_remote_count(name: &str) -> u32 {
    with_runtime(|rt| rt.get_remote_count(name))
}

pub fn get_timeout_timestamp() -> Option<i64> {
    with_runtime(|rt| rt.get_timeout_timestamp())
}

pub fn get_timeout_ms() -> Option<u64> {
    with_runtime(|rt| rt.get_timeout_ms())
}
