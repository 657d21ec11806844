//! The event loop and public `Runtime` value.
//!
//! `Runtime<P, S>` owns the reactor, the two transport contexts, and the
//! three symbol tables. It is generic over the transport traits so tests can
//! drive two in-process loopback instances without a real socket, while
//! `Runtime::bind` wires up the shipped UDP reference transport.

use std::time::Duration as StdDuration;

use dstc_transport::{PubTransport, Reactor, SubTransport, UdpConfig, UdpPubTransport, UdpSubTransport};
use mio::Events;
use tracing::warn;

use crate::{
    config::Config,
    discovery,
    dispatch::dispatch_packet,
    error::DstcError,
    queue::{build_callback_frame, build_name_frame, enqueue_frame},
    tables::{CallbackTable, LocalTable, MAX_NAME_LEN, RemoteTable},
    timers::{deadline_to_relative_ms, next_deadline_us, now_us},
};

const EVENTS_CAPACITY: usize = 64;

/// Outcome of one blocking wait on the reactor, or of a full `process_events`
/// budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSignal {
    /// At least one reactor event was serviced.
    Dispatched,
    /// The wait elapsed with nothing ready.
    TimedOut,
}

pub struct Runtime<P: PubTransport, S: SubTransport> {
    reactor: Reactor,
    pub_transport: P,
    sub_transport: S,
    local: LocalTable,
    callbacks: CallbackTable,
    remote: RemoteTable,
    outbound: Vec<u8>,
    max_packet_size: usize,
    events: Events,
}

impl<P: PubTransport, S: SubTransport> Runtime<P, S> {
    pub fn new(reactor: Reactor, pub_transport: P, sub_transport: S, config: &Config) -> Self {
        Self {
            reactor,
            pub_transport,
            sub_transport,
            local: LocalTable::new(config.local_capacity),
            callbacks: CallbackTable::new(config.callback_capacity),
            remote: RemoteTable::new(config.remote_capacity),
            outbound: Vec::new(),
            max_packet_size: config.max_packet_size,
            events: Events::with_capacity(EVENTS_CAPACITY),
        }
    }

    /// Registers `handler` under `name`; newest registration for a given name
    /// wins. Fatal if the local table is at capacity.
    pub fn register_local_function(
        &mut self,
        name: &str,
        handler: impl Fn(u64, &[u8]) + Send + Sync + 'static,
    ) {
        self.local.register(name, Box::new(handler));
    }

    /// Registers a one-shot callback, returning the token to queue it under.
    pub fn register_callback(&mut self, handler: impl FnOnce(u64, &[u8]) + Send + 'static) -> u64 {
        self.callbacks.register(Box::new(handler))
    }

    /// Cancels `token`; a no-op if already consumed or never registered.
    pub fn cancel_callback(&mut self, token: u64) {
        self.callbacks.cancel(token);
    }

    /// Frames and enqueues a call to `name`, flushing the outbound packet
    /// immediately if it would overflow `max_packet_size`.
    pub fn queue_function_call(&mut self, name: &str, args: &[u8]) -> Result<(), DstcError> {
        if name.len() > MAX_NAME_LEN {
            return Err(DstcError::NameTooLong(name.to_string(), MAX_NAME_LEN));
        }
        let node_id = self.pub_transport.node_id();
        let frame = build_name_frame(node_id, name, args);
        enqueue_frame(&mut self.outbound, self.max_packet_size, frame, |buf| {
            self.pub_transport.queue_packet(buf)
        })?;
        Ok(())
    }

    /// Frames and enqueues a callback invocation under `token`.
    pub fn queue_callback(&mut self, token: u64, args: &[u8]) -> Result<(), DstcError> {
        let node_id = self.pub_transport.node_id();
        let frame = build_callback_frame(node_id, token, args);
        enqueue_frame(&mut self.outbound, self.max_packet_size, frame, |buf| {
            self.pub_transport.queue_packet(buf)
        })?;
        Ok(())
    }

    pub fn get_remote_count(&self, name: &str) -> u32 {
        self.remote.count(name)
    }

    pub fn get_node_id(&self) -> u64 {
        self.pub_transport.node_id()
    }

    pub fn get_socket_count(&self) -> usize {
        self.pub_transport.socket_count()
    }

    /// Absolute microsecond deadline of the nearer of the pub/sub contexts'
    /// next scheduled action, or `None` if neither has one pending.
    pub fn get_timeout_timestamp(&self) -> Option<i64> {
        next_deadline_us(&self.pub_transport, &self.sub_transport)
    }

    /// `get_timeout_timestamp` expressed as a relative millisecond wait.
    pub fn get_timeout_ms(&self) -> Option<u64> {
        deadline_to_relative_ms(self.get_timeout_timestamp(), now_us())
    }

    /// Fires both contexts' timeout handlers (retransmits, announce
    /// beacons).
    pub fn process_timeout(&mut self) {
        self.pub_transport.process_timeout();
        self.sub_transport.process_timeout();
    }

    /// Lower-level entry point for callers driving their own `mio::Poll`
    /// loop one event at a time. Takes no event value: the shipped UDP
    /// transport shares one socket set across pub/sub and drains everything
    /// in a single `read` call regardless of which registered socket woke
    /// the reactor, so a specific event carries no information this
    /// implementation would act on.
    pub fn process_reactor_event(&mut self) {
        self.drain_transport();
    }

    /// Blocks on the reactor for at most `timeout_ms` (`None` =
    /// indefinitely). Flushes any unflushed outbound frames first so calls
    /// queued since the last turn go out as one packet.
    pub fn process_single_event(&mut self, timeout_ms: Option<u64>) -> LoopSignal {
        self.flush_outbound();
        self.reactor.wait(&mut self.events, timeout_ms.map(StdDuration::from_millis));
        if self.events.is_empty() {
            return LoopSignal::TimedOut;
        }
        self.drain_transport();
        LoopSignal::Dispatched
    }

    /// Runs `process_single_event` repeatedly for up to `timeout_us`
    /// (`None` means run until the process ends). On each iteration the
    /// nearer of the transports' own next deadline and the caller's budget
    /// is used as the wait timeout; an elapsed transport deadline runs the
    /// timeout path and loops, while an elapsed caller budget returns
    /// `TimedOut`.
    pub fn process_events(&mut self, timeout_us: Option<u64>) -> LoopSignal {
        loop {
            let now = now_us();
            let event_deadline = self.get_timeout_timestamp();
            let arg_deadline = timeout_us.map(|us| now.saturating_add(i64::try_from(us).unwrap_or(i64::MAX)));

            let (chosen_deadline, arg_chosen) = match (event_deadline, arg_deadline) {
                (None, None) => (None, false),
                (Some(e), None) => (Some(e), false),
                (None, Some(a)) => (Some(a), true),
                (Some(e), Some(a)) => {
                    if a <= e { (Some(a), true) } else { (Some(e), false) }
                }
            };

            let relative_ms = deadline_to_relative_ms(chosen_deadline, now);
            let signal = self.process_single_event(relative_ms);

            if signal == LoopSignal::TimedOut {
                if arg_chosen {
                    return LoopSignal::TimedOut;
                }
                self.process_timeout();
                continue;
            }
        }
    }

    fn flush_outbound(&mut self) {
        if self.outbound.is_empty() {
            return;
        }
        let buf = std::mem::take(&mut self.outbound);
        if let Err(e) = self.pub_transport.queue_packet(buf) {
            warn!("failed to queue outbound packet: {e}");
        }
    }

    /// Drains everything the reactor just reported ready: reassembled data
    /// packets dispatch through the pipeline in `dispatch`, new-peer
    /// sightings trigger the discovery announce step, received
    /// advertisements update the remote-function table, and any outbound
    /// backlog left over from a prior `WouldBlock` gets a chance to drain.
    /// Subscription/advertisement callbacks only accumulate node ids and
    /// bytes while `sub_transport.read` runs (it borrows `self.sub_transport`
    /// and must not also need `self.local` or `self.remote`); the
    /// accumulated lists are applied to the rest of `self` once `read`
    /// returns.
    fn drain_transport(&mut self) {
        let mut newly_subscribed = Vec::new();
        let mut advertisements = Vec::new();
        self.sub_transport.read(
            &mut self.reactor,
            &mut |peer| newly_subscribed.push(peer),
            &mut |peer, name| advertisements.push((peer, name.to_vec())),
        );

        let local_node_id = self.pub_transport.node_id();
        for peer in newly_subscribed {
            discovery::announce_to_peer(&self.local, &mut self.sub_transport, local_node_id, peer);
        }
        for (peer, name) in advertisements {
            discovery::on_advertisement(&mut self.remote, peer, &name);
        }

        while let Some((sender, packet)) = self.sub_transport.take_next_dispatch_ready() {
            dispatch_packet(&self.local, &mut self.callbacks, sender, &packet);
        }

        if let Err(e) = self.pub_transport.write(&mut self.reactor) {
            warn!("failed to flush backlogged outbound packets: {e}");
        }
    }
}

impl Runtime<UdpPubTransport, UdpSubTransport> {
    /// Binds the reference UDP-multicast transport per `config` and returns
    /// a ready-to-run runtime.
    pub fn bind(config: Config) -> std::io::Result<Self> {
        let mut reactor = Reactor::new();
        let udp_config = UdpConfig {
            node_id: config.node_id.unwrap_or_else(dstc_transport::rand_node_id),
            group_addr: config.group_addr,
            group_port: config.group_port,
            beacon_port: config.beacon_port,
            control_bind_addr: config.control_bind_addr,
            max_packet_size: config.max_packet_size,
            announce_interval: config.announce_interval,
        };
        let (pub_transport, sub_transport) = dstc_transport::bind(udp_config, &mut reactor)?;
        Ok(Self::new(reactor, pub_transport, sub_transport, &config))
    }
}
