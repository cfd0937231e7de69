//! Engine state snapshots.
//!
//! Layout: a fixed 10-byte header (magic, version, body length, all
//! little-endian) followed by a postcard-encoded body holding the activity
//! timestamps and every live slot in queue insertion order. The header is
//! validated on restore; anything malformed is rejected before the body is
//! touched.
//!
//! Payload bytes travel with each slot, so a restored engine can resend
//! exactly what was queued when the snapshot was taken.

use serde::{Deserialize, Serialize};

use crate::engine::{Engine, Queue};
use crate::error::{Error, Result};
use crate::message::{Message, Role};
use crate::pool::TX_POOL_LEN;
use crate::Timestamp;

const MAGIC: [u8; 4] = *b"OCPP";
const VERSION: u16 = 1;
const HEADER_LEN: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
enum QueueTag {
    Ready,
    Wait,
    Timer,
}

impl From<Queue> for QueueTag {
    fn from(which: Queue) -> Self {
        match which {
            Queue::Ready => QueueTag::Ready,
            Queue::Wait => QueueTag::Wait,
            Queue::Timer => QueueTag::Timer,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SlotRecord {
    queue: QueueTag,
    msg: Message,
    expiry: Timestamp,
    attempts: u32,
}

#[derive(Serialize, Deserialize)]
struct SnapshotBody {
    last_tx: Timestamp,
    last_rx: Timestamp,
    slots: heapless::Vec<SlotRecord, TX_POOL_LEN>,
}

fn collect(engine: &Engine) -> SnapshotBody {
    let mut slots = heapless::Vec::new();
    for which in Queue::ALL {
        for idx in engine.list(which).iter(&engine.links) {
            let slot = engine.pool.slot(idx);
            // Every live slot sits in exactly one queue, so at most
            // TX_POOL_LEN records exist and the push cannot overflow.
            let _ = slots.push(SlotRecord {
                queue: QueueTag::from(which),
                msg: slot.msg.clone(),
                expiry: slot.expiry,
                attempts: slot.attempts,
            });
        }
    }

    SnapshotBody {
        last_tx: engine.last_tx,
        last_rx: engine.last_rx,
        slots,
    }
}

fn body_bytes(engine: &Engine) -> Result<Vec<u8>> {
    postcard::to_allocvec(&collect(engine)).map_err(|_| Error::Invalid)
}

/// Exact buffer size a save needs right now.
pub(crate) fn size(engine: &Engine) -> usize {
    body_bytes(engine).map_or(HEADER_LEN, |b| HEADER_LEN + b.len())
}

pub(crate) fn save(engine: &Engine, buf: &mut [u8]) -> Result<usize> {
    let body = body_bytes(engine)?;
    let total = HEADER_LEN + body.len();
    if buf.len() < total {
        return Err(Error::OutOfMemory);
    }

    buf[0..4].copy_from_slice(&MAGIC);
    buf[4..6].copy_from_slice(&VERSION.to_le_bytes());
    buf[6..10].copy_from_slice(&(body.len() as u32).to_le_bytes());
    buf[HEADER_LEN..total].copy_from_slice(&body);
    Ok(total)
}

pub(crate) fn restore(buf: &[u8]) -> Result<Engine> {
    if buf.len() < HEADER_LEN || buf[0..4] != MAGIC {
        return Err(Error::Invalid);
    }
    if u16::from_le_bytes([buf[4], buf[5]]) != VERSION {
        return Err(Error::Invalid);
    }
    let body_len = u32::from_le_bytes([buf[6], buf[7], buf[8], buf[9]]) as usize;
    let body = buf
        .get(HEADER_LEN..HEADER_LEN + body_len)
        .ok_or(Error::Invalid)?;
    let body: SnapshotBody = postcard::from_bytes(body).map_err(|_| Error::Invalid)?;

    let mut engine = Engine::new(0);
    engine.last_tx = body.last_tx;
    engine.last_rx = body.last_rx;

    for record in body.slots {
        // A free or half-initialised slot has no business in a snapshot,
        // and Wait holds at most one message.
        if matches!(record.msg.role, Role::None | Role::Alloc) {
            return Err(Error::Invalid);
        }
        if matches!(record.queue, QueueTag::Wait) && !engine.wait.is_empty() {
            return Err(Error::Invalid);
        }

        let idx = engine.pool.alloc().ok_or(Error::Invalid)?;
        let slot = engine.pool.slot_mut(idx);
        slot.msg = record.msg;
        slot.expiry = record.expiry;
        slot.attempts = record.attempts;

        // Records were collected head to tail, so tail pushes rebuild the
        // original insertion order.
        match record.queue {
            QueueTag::Ready => engine.ready.push_tail(&mut engine.links, idx),
            QueueTag::Wait => engine.wait.push_tail(&mut engine.links, idx),
            QueueTag::Timer => engine.timer.push_tail(&mut engine.links, idx),
        }
    }

    Ok(engine)
}
