//! Fixed-capacity message pool.
//!
//! A slab of [`TX_POOL_LEN`] slots, allocated by linear scan and recycled
//! in place. The pool is the single source of capacity: the queues link
//! slot indices and hold no storage of their own. `role == None` marks a
//! free slot; `alloc` claims one by flipping it to `Alloc`, and the caller
//! finishes initialisation before queueing it.

use crate::message::{Message, Role};
use crate::Timestamp;

/// Number of message slots. Eight in-flight or queued messages is ample
/// for a single-connector charge point; capacity pressure is handled by
/// forced eviction, not by growing the pool.
pub const TX_POOL_LEN: usize = 8;

/// One pool entry: the message plus its scheduling state.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Slot {
    /// The message body.
    pub msg: Message,
    /// Absolute deadline: retry timeout while waiting for a response,
    /// fire time while deferred.
    pub expiry: Timestamp,
    /// Completed send invocations for this slot. Reset only on allocation.
    pub attempts: u32,
}

/// Fixed slab of message slots.
#[derive(Debug)]
pub struct MessagePool {
    slots: [Slot; TX_POOL_LEN],
}

impl Default for MessagePool {
    fn default() -> Self {
        Self::new()
    }
}

impl MessagePool {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| Slot::default()),
        }
    }

    /// Claim the first free slot, marking it `Alloc`. Returns `None` when
    /// every slot is live.
    pub fn alloc(&mut self) -> Option<u8> {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.msg.role == Role::None {
                slot.msg.role = Role::Alloc;
                slot.attempts = 0;
                return Some(i as u8);
            }
        }
        None
    }

    /// Recycle a slot. The caller must have unlinked it from any queue and
    /// emitted the free event first; afterwards the slot reads as free.
    pub fn free(&mut self, idx: u8) {
        self.slots[idx as usize] = Slot::default();
    }

    pub fn slot(&self, idx: u8) -> &Slot {
        &self.slots[idx as usize]
    }

    pub fn slot_mut(&mut self, idx: u8) -> &mut Slot {
        &mut self.slots[idx as usize]
    }

    /// Number of live (non-free) slots.
    pub fn live(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.msg.role != Role::None)
            .count()
    }
}
