use std::io;

use crate::reactor::Reactor;

/// A single reassembled, in-order packet released to the application: the
/// sender's node id and the concatenated-frames payload.
pub type DispatchReadyPacket = (u64, Vec<u8>);

/// Control-message kind prefix for a function-name advertisement, sent over
/// `write_control_message_by_node_id`. Callers building a control message
/// body must prepend this byte themselves; the transport only demultiplexes
/// by it on receive, it does not add it on send (the transport has no
/// opinion on what kinds of control messages the core wants to exchange
/// beyond this one discovery use).
pub const CONTROL_KIND_ADVERTISE: u8 = 1;

/// Publisher-side half of the transport contract. Owns the path outbound
/// calls travel: `queue_packet` hands a framed buffer to the transport for
/// reliable delivery, `write` drains it opportunistically when the reactor
/// signals the publisher socket writable.
pub trait PubTransport {
    fn node_id(&self) -> u64;

    /// Takes ownership of `buf` and queues it for delivery. The transport is
    /// responsible for releasing the buffer once delivery is confirmed (or
    /// abandoned); the reference transport releases immediately after the
    /// underlying `send_to` call since UDP send is fire-and-forget.
    fn queue_packet(&mut self, buf: Vec<u8>) -> io::Result<()>;

    /// Services writable-readiness: flushes whatever is queued. Called once
    /// per event-loop turn so a backlog left over from a prior `WouldBlock`
    /// keeps draining even when no new packet is queued. The reference
    /// transport never registers transient writable interest (see
    /// `udp::bind`), so in practice this runs opportunistically rather than
    /// from a reactor-reported write event; the method stays part of the
    /// contract for parity with transports that do need one.
    fn write(&mut self, reactor: &mut Reactor) -> io::Result<()>;

    /// Absolute microsecond deadline for this context's next scheduled
    /// action (e.g. the next announce beacon), or `None` for "nothing
    /// pending".
    fn next_deadline_us(&self) -> Option<i64>;

    /// Invoked when this context's deadline (or a shared reactor timeout)
    /// elapses: fires announces, retransmits, etc.
    fn process_timeout(&mut self);

    fn socket_count(&self) -> usize;
}

/// Subscriber-side half of the transport contract.
pub trait SubTransport {
    fn node_id(&self) -> u64;

    /// Services readable-readiness: reassembles data packets into the
    /// dispatch-ready queue, and demultiplexes control-channel messages into
    /// the two callbacks below. Modeled as message-passing closures (rather
    /// than a back-reference into the core) to avoid a reference cycle
    /// between transport and runtime.
    ///
    /// - `on_subscription_complete(peer_node_id)`: fired once, the first
    ///   time a peer's presence is observed.
    /// - `on_advertisement(peer_node_id, function_name_bytes)`: fired once
    ///   per advertised name received on the control channel.
    fn read(
        &mut self,
        reactor: &mut Reactor,
        on_subscription_complete: &mut dyn FnMut(u64),
        on_advertisement: &mut dyn FnMut(u64, &[u8]),
    );

    /// Pops the oldest not-yet-dispatched packet, if any. FIFO order across
    /// calls.
    fn take_next_dispatch_ready(&mut self) -> Option<DispatchReadyPacket>;

    fn next_deadline_us(&self) -> Option<i64>;

    fn process_timeout(&mut self);

    /// Sends a control message (a discovery advertisement) to one specific
    /// peer, addressed by node id.
    fn write_control_message_by_node_id(&mut self, node_id: u64, buf: &[u8]) -> io::Result<()>;
}
