//! End-to-end tests driving two `Runtime` instances connected by an
//! in-process loopback transport double instead of real sockets.
//!
//! The double never registers anything with the reactor, so `reactor.wait`
//! never reports readiness for it; tests drive dispatch explicitly via
//! `Runtime::process_reactor_event` after a send, and via
//! `Runtime::process_single_event`/`process_events` where only the
//! outbound-flush or the real elapsed-time behavior is under test.

use std::{
    cell::RefCell,
    collections::VecDeque,
    io,
    rc::Rc,
    sync::{Arc, Mutex},
    time::{Duration as StdDuration, Instant as StdInstant},
};

use dstc::{Config, LoopSignal, PubTransport, Reactor, Runtime, SubTransport};
use dstc_transport::contract::CONTROL_KIND_ADVERTISE;

type DataQueue = Rc<RefCell<VecDeque<(u64, Vec<u8>)>>>;
type ControlQueue = Rc<RefCell<VecDeque<Vec<u8>>>>;

struct LoopbackPub {
    node_id: u64,
    outbox_data: DataQueue,
}

impl PubTransport for LoopbackPub {
    fn node_id(&self) -> u64 {
        self.node_id
    }

    fn queue_packet(&mut self, buf: Vec<u8>) -> io::Result<()> {
        self.outbox_data.borrow_mut().push_back((self.node_id, buf));
        Ok(())
    }

    fn write(&mut self, _reactor: &mut Reactor) -> io::Result<()> {
        Ok(())
    }

    fn next_deadline_us(&self) -> Option<i64> {
        None
    }

    fn process_timeout(&mut self) {}

    fn socket_count(&self) -> usize {
        1
    }
}

struct LoopbackSub {
    node_id: u64,
    peer_node_id: u64,
    inbox_data: DataQueue,
    inbox_control: ControlQueue,
    outbox_control: ControlQueue,
    dispatch_ready: VecDeque<(u64, Vec<u8>)>,
    subscription_fired: bool,
}

impl SubTransport for LoopbackSub {
    fn node_id(&self) -> u64 {
        self.node_id
    }

    fn read(
        &mut self,
        _reactor: &mut Reactor,
        on_subscription_complete: &mut dyn FnMut(u64),
        on_advertisement: &mut dyn FnMut(u64, &[u8]),
    ) {
        if !self.subscription_fired {
            self.subscription_fired = true;
            on_subscription_complete(self.peer_node_id);
        }

        while let Some(buf) = self.inbox_control.borrow_mut().pop_front() {
            if buf.is_empty() {
                continue;
            }
            let (kind, body) = (buf[0], &buf[1..]);
            if kind != CONTROL_KIND_ADVERTISE {
                continue;
            }
            if let Some(nul) = body.iter().position(|&b| b == 0) {
                on_advertisement(self.peer_node_id, &body[..nul]);
            }
        }

        while let Some(pair) = self.inbox_data.borrow_mut().pop_front() {
            self.dispatch_ready.push_back(pair);
        }
    }

    fn take_next_dispatch_ready(&mut self) -> Option<(u64, Vec<u8>)> {
        self.dispatch_ready.pop_front()
    }

    fn next_deadline_us(&self) -> Option<i64> {
        None
    }

    fn process_timeout(&mut self) {}

    fn write_control_message_by_node_id(&mut self, node_id: u64, buf: &[u8]) -> io::Result<()> {
        if node_id != self.peer_node_id {
            return Err(io::Error::new(io::ErrorKind::NotFound, "unknown peer node id"));
        }
        self.outbox_control.borrow_mut().push_back(buf.to_vec());
        Ok(())
    }
}

fn loopback_pair(
    node_a: u64,
    node_b: u64,
) -> ((LoopbackPub, LoopbackSub), (LoopbackPub, LoopbackSub)) {
    let data_a_to_b: DataQueue = Rc::new(RefCell::new(VecDeque::new()));
    let data_b_to_a: DataQueue = Rc::new(RefCell::new(VecDeque::new()));
    let ctrl_a_to_b: ControlQueue = Rc::new(RefCell::new(VecDeque::new()));
    let ctrl_b_to_a: ControlQueue = Rc::new(RefCell::new(VecDeque::new()));

    let pub_a = LoopbackPub { node_id: node_a, outbox_data: data_a_to_b.clone() };
    let sub_a = LoopbackSub {
        node_id: node_a,
        peer_node_id: node_b,
        inbox_data: data_b_to_a.clone(),
        inbox_control: ctrl_b_to_a.clone(),
        outbox_control: ctrl_a_to_b.clone(),
        dispatch_ready: VecDeque::new(),
        subscription_fired: false,
    };

    let pub_b = LoopbackPub { node_id: node_b, outbox_data: data_b_to_a };
    let sub_b = LoopbackSub {
        node_id: node_b,
        peer_node_id: node_a,
        inbox_data: data_a_to_b,
        inbox_control: ctrl_a_to_b,
        outbox_control: ctrl_b_to_a,
        dispatch_ready: VecDeque::new(),
        subscription_fired: false,
    };
    ((pub_a, sub_a), (pub_b, sub_b))
}

fn runtime_over(reactor: Reactor, p: LoopbackPub, s: LoopbackSub, config: &Config) -> Runtime<LoopbackPub, LoopbackSub> {
    Runtime::new(reactor, p, s, config)
}

#[test]
fn name_dispatch_delivers_sender_and_bytes() {
    let ((pub_a, sub_a), (pub_b, sub_b)) = loopback_pair(1, 2);
    let config = Config::default().with_table_capacities(8, 8, 8);
    let mut a = runtime_over(Reactor::new(), pub_a, sub_a, &config);
    let mut b = runtime_over(Reactor::new(), pub_b, sub_b, &config);

    let received = Arc::new(Mutex::new(Vec::new()));
    let captured = received.clone();
    a.register_local_function("print", move |node_id, args| {
        captured.lock().unwrap().push((node_id, args.to_vec()));
    });

    b.queue_function_call("print", &[0x2a]).unwrap();
    b.process_single_event(Some(0));
    a.process_reactor_event();

    assert_eq!(*received.lock().unwrap(), vec![(2, vec![0x2a])]);
}

#[test]
fn packed_frames_dispatch_in_order() {
    let ((pub_a, sub_a), (pub_b, sub_b)) = loopback_pair(1, 2);
    let config = Config::default().with_table_capacities(8, 8, 8);
    let mut a = runtime_over(Reactor::new(), pub_a, sub_a, &config);
    let mut b = runtime_over(Reactor::new(), pub_b, sub_b, &config);

    let received = Arc::new(Mutex::new(Vec::new()));
    let captured = received.clone();
    a.register_local_function("print", move |_node_id, args| {
        captured.lock().unwrap().push(args.to_vec());
    });

    b.queue_function_call("print", &[1]).unwrap();
    b.queue_function_call("print", &[2]).unwrap();
    b.process_single_event(Some(0));
    a.process_reactor_event();

    assert_eq!(*received.lock().unwrap(), vec![vec![1], vec![2]]);
}

#[test]
fn unknown_name_is_skipped_but_following_frame_still_dispatches() {
    let ((pub_a, sub_a), (pub_b, sub_b)) = loopback_pair(1, 2);
    let config = Config::default().with_table_capacities(8, 8, 8);
    let mut a = runtime_over(Reactor::new(), pub_a, sub_a, &config);
    let mut b = runtime_over(Reactor::new(), pub_b, sub_b, &config);

    let received = Arc::new(Mutex::new(Vec::new()));
    let captured = received.clone();
    a.register_local_function("print", move |_node_id, args| {
        captured.lock().unwrap().push(args.to_vec());
    });

    b.queue_function_call("absent", &[9]).unwrap();
    b.queue_function_call("print", &[1]).unwrap();
    b.process_single_event(Some(0));
    a.process_reactor_event();

    assert_eq!(*received.lock().unwrap(), vec![vec![1]]);
}

#[test]
fn discovery_announce_populates_remote_count() {
    let ((pub_a, sub_a), (pub_b, sub_b)) = loopback_pair(1, 2);
    let config = Config::default().with_table_capacities(8, 8, 8);
    let mut a = runtime_over(Reactor::new(), pub_a, sub_a, &config);
    let mut b = runtime_over(Reactor::new(), pub_b, sub_b, &config);

    a.register_local_function("print", |_, _| {});

    // First event on either side fires subscription-complete, which drives
    // A's announce step over to B's control inbox.
    a.process_reactor_event();
    assert_eq!(b.get_remote_count("print"), 0);
    b.process_reactor_event();
    assert_eq!(b.get_remote_count("print"), 1);

    // A second subscription-complete never fires again, and a duplicate
    // drain is a no-op: the count stays at its high-water mark.
    b.process_reactor_event();
    assert_eq!(b.get_remote_count("print"), 1);
}

#[test]
fn timeout_returns_between_50_and_100_ms() {
    let ((pub_a, sub_a), _unused) = loopback_pair(1, 2);
    let config = Config::default();
    let mut a = runtime_over(Reactor::new(), pub_a, sub_a, &config);

    let start = StdInstant::now();
    let signal = a.process_events(Some(50_000));
    let elapsed = start.elapsed();

    assert_eq!(signal, LoopSignal::TimedOut);
    assert!(elapsed >= StdDuration::from_millis(50), "returned too early: {elapsed:?}");
    assert!(elapsed < StdDuration::from_millis(100), "returned too late: {elapsed:?}");
}
