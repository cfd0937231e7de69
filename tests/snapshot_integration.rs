//! Snapshot round-trip laws.
//!
//! A snapshot must restore to an engine with the same pending set (ids,
//! types, roles, attempts, expiries) and the same activity timestamps.
//! Byte-identity of a re-taken snapshot is the strongest observable form
//! of that law, and is what these tests lean on.

use std::collections::VecDeque;

use ocpp_engine::config::OcppConfig;
use ocpp_engine::{
    Action, Engine, EngineEvent, Error, EventSink, IdSource, LinkPort, Message, MessageId,
    Payload, Role,
};

// ── Minimal mocks ─────────────────────────────────────────────

struct SeqIds {
    next: u32,
}

impl IdSource for SeqIds {
    fn next_id(&mut self) -> MessageId {
        self.next += 1;
        let mut id = MessageId::new();
        let _ = core::fmt::Write::write_fmt(&mut id, format_args!("snap-{:07}", self.next));
        id
    }
}

#[derive(Default)]
struct Link {
    rx: VecDeque<Message>,
    sent_ids: Vec<String>,
    sent_actions: Vec<Action>,
}

impl LinkPort for Link {
    fn send(&mut self, msg: &Message) -> ocpp_engine::Result<()> {
        self.sent_ids.push(msg.id.as_str().to_string());
        self.sent_actions.push(msg.action);
        Ok(())
    }

    fn recv(&mut self) -> ocpp_engine::Result<Option<Message>> {
        Ok(self.rx.pop_front())
    }
}

#[derive(Default)]
struct CountingSink {
    frees: usize,
}

impl EventSink for CountingSink {
    fn emit(&mut self, event: EngineEvent<'_>) {
        if matches!(event, EngineEvent::MessageFree(_)) {
            self.frees += 1;
        }
    }
}

fn take_snapshot(engine: &Engine) -> Vec<u8> {
    let mut buf = vec![0u8; engine.snapshot_size()];
    let written = engine.save_snapshot(&mut buf).unwrap();
    assert_eq!(written, buf.len());
    buf
}

/// Engine with one message in each queue: DataTransfer in flight,
/// StartTransaction ready, StatusNotification deferred.
fn populated_engine() -> (Engine, Link) {
    let mut engine = Engine::new(0);
    let mut ids = SeqIds { next: 0 };
    let mut link = Link::default();
    let mut sink = CountingSink::default();
    let config = OcppConfig::default();

    let payload = Payload::from_slice(b"{\"vendorId\":\"vnd\"}").unwrap();
    engine
        .push_request(Action::DataTransfer, payload, false, &mut ids, &mut sink)
        .unwrap();
    engine
        .push_request(Action::StartTransaction, Payload::new(), false, &mut ids, &mut sink)
        .unwrap();
    engine
        .push_request_deferred(Action::StatusNotification, Payload::new(), 60, 0, &mut ids)
        .unwrap();

    engine.step(0, &mut link, &mut ids, &config, &mut sink);
    assert_eq!(engine.pending_requests(), 3);
    (engine, link)
}

// ── Round-trip laws ───────────────────────────────────────────

#[test]
fn empty_engine_round_trips() {
    let engine = Engine::new(42);
    let snap = take_snapshot(&engine);

    let restored = Engine::restore_snapshot(&snap).unwrap();
    assert_eq!(restored.pending_requests(), 0);
    assert_eq!(take_snapshot(&restored), snap);
}

#[test]
fn populated_engine_round_trips_byte_identically() {
    let (engine, link) = populated_engine();
    let snap = take_snapshot(&engine);

    let restored = Engine::restore_snapshot(&snap).unwrap();
    assert_eq!(restored.pending_requests(), engine.pending_requests());

    // The in-flight CALL is still resolvable by its id after restore.
    let inflight_id = &link.sent_ids[0];
    assert_eq!(restored.action_for_id(inflight_id), Some(Action::DataTransfer));

    // Per-slot (id, type, role, attempts, expiry) survived: a second
    // snapshot is bit-for-bit the first one.
    assert_eq!(take_snapshot(&restored), snap);
}

#[test]
fn restored_engine_keeps_operating() {
    let (engine, link) = populated_engine();
    let snap = take_snapshot(&engine);
    let mut restored = Engine::restore_snapshot(&snap).unwrap();

    // The Central System answers the restored in-flight call.
    let mut id = MessageId::new();
    id.push_str(&link.sent_ids[0]).unwrap();
    let mut new_link = Link::default();
    new_link
        .rx
        .push_back(Message::new(id, Role::CallResult, Action::DataTransfer, Payload::new()));

    let mut ids = SeqIds { next: 100 };
    let mut sink = CountingSink::default();
    let config = OcppConfig::default();
    restored.step(1, &mut new_link, &mut ids, &config, &mut sink);

    assert_eq!(sink.frees, 1);
    assert_eq!(restored.pending_requests(), 2);

    // Next tick sends the queued StartTransaction.
    restored.step(2, &mut new_link, &mut ids, &config, &mut sink);
    assert_eq!(new_link.sent_actions, vec![Action::StartTransaction]);
}

#[test]
fn restore_preserves_activity_timestamps() {
    let engine = Engine::new(42);
    let snap = take_snapshot(&engine);
    let mut restored = Engine::restore_snapshot(&snap).unwrap();

    let mut link = Link::default();
    let mut ids = SeqIds { next: 0 };
    let mut sink = CountingSink::default();
    let config = OcppConfig {
        heartbeat_interval_secs: 10,
        ..OcppConfig::default()
    };

    // Idle is measured from the snapshotted timestamps (42), not from
    // the restore.
    restored.step(51, &mut link, &mut ids, &config, &mut sink);
    assert!(link.sent_actions.is_empty());

    restored.step(52, &mut link, &mut ids, &config, &mut sink);
    assert_eq!(link.sent_actions, vec![Action::Heartbeat]);
}

// ── Validation ────────────────────────────────────────────────

#[test]
fn save_rejects_a_short_buffer() {
    let (engine, _) = populated_engine();
    let mut buf = vec![0u8; engine.snapshot_size() - 1];
    assert_eq!(engine.save_snapshot(&mut buf), Err(Error::OutOfMemory));
}

#[test]
fn restore_rejects_bad_magic() {
    let (engine, _) = populated_engine();
    let mut snap = take_snapshot(&engine);
    snap[0] ^= 0xFF;
    assert!(matches!(Engine::restore_snapshot(&snap), Err(Error::Invalid)));
}

#[test]
fn restore_rejects_unknown_version() {
    let (engine, _) = populated_engine();
    let mut snap = take_snapshot(&engine);
    snap[4] = 0xEE;
    assert!(matches!(Engine::restore_snapshot(&snap), Err(Error::Invalid)));
}

#[test]
fn restore_rejects_truncated_input() {
    let (engine, _) = populated_engine();
    let snap = take_snapshot(&engine);
    assert!(matches!(
        Engine::restore_snapshot(&snap[..snap.len() - 1]),
        Err(Error::Invalid)
    ));
    assert!(matches!(Engine::restore_snapshot(&[]), Err(Error::Invalid)));
}
