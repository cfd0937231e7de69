//! The message engine: dispatcher, ingress router, and public API.
//!
//! A single cooperative state machine owns every outbound request. Three
//! queues over the fixed pool carry a message through its life:
//!
//! ```text
//!  push_request ──▶ Ready ──send──▶ Wait ──response──▶ freed
//!                     ▲              │
//!                     │ timeout      │ transaction CALLERROR
//!                     └──────────────┘ (backoff, no resend)
//!  push_request_deferred ──▶ Timer ──expiry──▶ Ready
//! ```
//!
//! The host advances the engine with [`Engine::step`], typically every
//! 100 ms to 1 s. One step sends at most one message, polls the link for
//! at most one frame, and synthesizes a Heartbeat when the link has been
//! idle for the configured interval. Only one CALL is ever in flight: the
//! next send waits until the previous CALL is matched, retried, or freed.
//!
//! Retry rules are asymmetric by design: transaction-related messages and
//! BootNotification retry indefinitely, everything else is dropped once
//! its attempt budget is spent.

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::message::{Action, Message, Payload, Role};
use crate::pool::{MessagePool, TX_POOL_LEN};
use crate::ports::{ConfigPort, EngineEvent, EventSink, IdSource, LinkPort};
use crate::queue::{Link, List};
use crate::snapshot;
use crate::Timestamp;

/// Seconds a sent CALL waits for its response before the timeout sweep
/// picks it up again (`OCPP_DEFAULT_TX_TIMEOUT_SEC`).
pub const DEFAULT_TX_TIMEOUT_SECS: u64 = 10;

/// Transport-level attempt budget for droppable messages.
pub const DEFAULT_TX_RETRIES: u32 = 1;

/// Queue discriminant, used by bulk operations and the snapshot encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Queue {
    Ready,
    Wait,
    Timer,
}

impl Queue {
    pub(crate) const ALL: [Queue; 3] = [Queue::Ready, Queue::Wait, Queue::Timer];
}

/// The client-side OCPP message engine.
///
/// All collaborators (transport, id source, configuration, event sink)
/// are passed into the methods that need them; between calls the engine
/// holds nothing but its own queues and timestamps. `&mut` receivers
/// serialize every entry point, so no separate lock is needed.
#[derive(Debug)]
pub struct Engine {
    pub(crate) pool: MessagePool,
    pub(crate) links: [Link; TX_POOL_LEN],
    pub(crate) ready: List,
    pub(crate) wait: List,
    pub(crate) timer: List,
    /// Stamped when a CALLRESULT/CALLERROR is received, not on send: the
    /// round-trip only counts once the server has answered.
    pub(crate) last_tx: Timestamp,
    /// Stamped on any successfully received frame.
    pub(crate) last_rx: Timestamp,
}

impl Engine {
    /// Fresh engine with empty queues and both activity timestamps set to
    /// `now`, so the first heartbeat is measured from initialisation.
    pub fn new(now: Timestamp) -> Self {
        Self {
            pool: MessagePool::new(),
            links: [Link::default(); TX_POOL_LEN],
            ready: List::new(),
            wait: List::new(),
            timer: List::new(),
            last_tx: now,
            last_rx: now,
        }
    }

    // ── Step cycle ────────────────────────────────────────────

    /// Advance the engine by one tick.
    ///
    /// In order: sweep Wait timeouts, send at most one Ready message
    /// (unless a CALL is already in flight), poll the link for one frame,
    /// synthesize a Heartbeat if the link is idle, promote expired Timer
    /// entries to Ready.
    pub fn step(
        &mut self,
        now: Timestamp,
        link: &mut impl LinkPort,
        ids: &mut impl IdSource,
        config: &impl ConfigPort,
        sink: &mut impl EventSink,
    ) {
        self.service_ready(now, link, sink);
        self.process_incoming(now, link, config, sink);
        self.process_periodic(now, link, ids, config, sink);
        self.promote_timers(now);
    }

    /// Sweep Wait, then send one Ready message if nothing is in flight.
    fn service_ready(
        &mut self,
        now: Timestamp,
        link: &mut impl LinkPort,
        sink: &mut impl EventSink,
    ) {
        self.sweep_wait(now, sink);

        // One request outstanding at a time; a pending response (or a
        // backoff-parked transaction message) holds all further sends.
        if !self.wait.is_empty() {
            return;
        }

        if let Some(idx) = self.ready.head() {
            self.send_message(idx, now, link, sink);
        }
    }

    /// Move timed-out Wait entries back to the head of Ready, dropping the
    /// ones whose attempt budget is spent.
    fn sweep_wait(&mut self, now: Timestamp, sink: &mut impl EventSink) {
        let mut cur = self.wait.head();
        while let Some(idx) = cur {
            cur = self.links[idx as usize].next();
            if self.pool.slot(idx).expiry > now {
                continue;
            }

            self.wait.remove(&mut self.links, idx);

            let slot = self.pool.slot(idx);
            if Self::should_drop(slot.msg.action, slot.attempts) {
                info!(
                    "dropping {} after {} attempts",
                    slot.msg.action, slot.attempts
                );
                self.free_slot(idx, sink);
            } else {
                info!("retrying {}", slot.msg.action);
                self.ready.push_head(&mut self.links, idx);
            }
        }
    }

    /// Drop policy: BootNotification and transaction-related messages are
    /// undroppable; everything else dies once its budget is spent.
    fn should_drop(action: Action, attempts: u32) -> bool {
        let droppable =
            !action.is_transaction_related() && action != Action::BootNotification;
        droppable && attempts >= DEFAULT_TX_RETRIES
    }

    /// Hand one message to the link and park or free it per the outcome.
    fn send_message(
        &mut self,
        idx: u8,
        now: Timestamp,
        link: &mut impl LinkPort,
        sink: &mut impl EventSink,
    ) {
        // The budget check on the failure path compares attempts before
        // this send: the first failed attempt always gets its timeout in
        // Wait, and the sweep decides its fate.
        let within_budget = self.pool.slot(idx).attempts < DEFAULT_TX_RETRIES;
        {
            let slot = self.pool.slot_mut(idx);
            slot.attempts += 1;
            slot.expiry = now + DEFAULT_TX_TIMEOUT_SECS;
        }
        self.ready.remove(&mut self.links, idx);

        let slot = self.pool.slot(idx);
        info!(
            "tx: {}.req ({}/{}), waiting up to {}s",
            slot.msg.action, slot.attempts, DEFAULT_TX_RETRIES, DEFAULT_TX_TIMEOUT_SECS
        );

        match link.send(&slot.msg) {
            Ok(()) => {
                if slot.msg.role == Role::Call {
                    self.wait.push_tail(&mut self.links, idx);
                } else {
                    // CALLRESULT/CALLERROR replies are fire-and-forget.
                    self.free_slot(idx, sink);
                }
            }
            Err(_) => {
                if within_budget
                    || slot.msg.action.is_transaction_related()
                    || slot.msg.action == Action::BootNotification
                {
                    // Park for the timeout path; the sweep retries it.
                    self.wait.push_tail(&mut self.links, idx);
                } else {
                    self.free_slot(idx, sink);
                }
            }
        }
    }

    // ── Ingress ───────────────────────────────────────────────

    /// Poll the link once and route the frame by role.
    fn process_incoming(
        &mut self,
        now: Timestamp,
        link: &mut impl LinkPort,
        config: &impl ConfigPort,
        sink: &mut impl EventSink,
    ) {
        let frame = match link.recv() {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(error) => {
                sink.emit(EngineEvent::Error {
                    error,
                    message: None,
                });
                return;
            }
        };

        match frame.role {
            Role::Call => {
                info!("rx: {}.req", frame.action);
            }
            Role::CallResult | Role::CallError => {
                let Some(idx) = self.find_wait_by_id(frame.id.as_str()) else {
                    warn!("no matching request for response {}", frame.action);
                    sink.emit(EngineEvent::Error {
                        error: Error::NoLink,
                        message: Some(&frame),
                    });
                    return;
                };
                self.settle_response(idx, frame.role, now, config, sink);
                self.last_tx = now;
            }
            Role::None | Role::Alloc => {
                warn!("invalid message role: {:?}", frame.role);
                sink.emit(EngineEvent::Error {
                    error: Error::Invalid,
                    message: Some(&frame),
                });
                return;
            }
        }

        self.last_rx = now;
        sink.emit(EngineEvent::MessageIncoming(&frame));
    }

    /// A response matched the in-flight CALL: free it, or re-park a
    /// transaction message that the server answered with CALLERROR.
    fn settle_response(
        &mut self,
        idx: u8,
        role: Role,
        now: Timestamp,
        config: &impl ConfigPort,
        sink: &mut impl EventSink,
    ) {
        self.wait.remove(&mut self.links, idx);

        let slot = self.pool.slot(idx);
        info!("rx: {}.conf", slot.msg.action);

        if role == Role::CallError && slot.msg.action.is_transaction_related() {
            let max_attempts = config.transaction_message_attempts();
            if slot.attempts < max_attempts {
                let backoff = u64::from(config.transaction_message_retry_interval())
                    * u64::from(slot.attempts);
                let attempts = slot.attempts;
                let action = slot.msg.action;

                // Parked in Wait without a resend; the timeout sweep
                // promotes it to Ready once the backoff expires.
                self.pool.slot_mut(idx).expiry = now + backoff;
                self.wait.push_tail(&mut self.links, idx);

                info!(
                    "{} will be sent again at {} ({}/{})",
                    action,
                    now + backoff,
                    attempts,
                    max_attempts
                );
                return;
            }
        }

        self.free_slot(idx, sink);
    }

    // ── Heartbeat ─────────────────────────────────────────────

    /// Heartbeats fire only when the engine is otherwise idle: nothing
    /// queued, nothing in flight, and no traffic in either direction for
    /// a full interval (elapsed >= interval, not strictly greater).
    fn should_send_heartbeat(&self, now: Timestamp, config: &impl ConfigPort) -> bool {
        let interval = config.heartbeat_interval();
        if interval == 0 || !self.ready.is_empty() || !self.wait.is_empty() {
            return false;
        }

        let last_activity = self.last_tx.max(self.last_rx);
        now.saturating_sub(last_activity) >= u64::from(interval)
    }

    fn process_periodic(
        &mut self,
        now: Timestamp,
        link: &mut impl LinkPort,
        ids: &mut impl IdSource,
        config: &impl ConfigPort,
        sink: &mut impl EventSink,
    ) {
        if !self.should_send_heartbeat(now, config) {
            return;
        }

        let Some(idx) = self.new_call(Action::Heartbeat, Payload::new(), ids) else {
            warn!("pool exhausted, skipping heartbeat");
            return;
        };
        self.ready.push_tail(&mut self.links, idx);
        debug!("heartbeat queued");

        // Send it this very tick; the link was idle by definition.
        self.service_ready(now, link, sink);
    }

    // ── Timers ────────────────────────────────────────────────

    /// Move expired deferred messages to the tail of Ready.
    fn promote_timers(&mut self, now: Timestamp) {
        let mut cur = self.timer.head();
        while let Some(idx) = cur {
            cur = self.links[idx as usize].next();
            if self.pool.slot(idx).expiry > now {
                continue;
            }
            self.timer.remove(&mut self.links, idx);
            self.ready.push_tail(&mut self.links, idx);
            debug!("{} promoted from timer", self.pool.slot(idx).msg.action);
        }
    }

    // ── Public API ────────────────────────────────────────────

    /// Queue an outbound CALL. When the pool is exhausted and `force` is
    /// set, the oldest evictable Ready message is freed to make room;
    /// otherwise the push fails with [`Error::OutOfMemory`].
    pub fn push_request(
        &mut self,
        action: Action,
        payload: Payload,
        force: bool,
        ids: &mut impl IdSource,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        if self.pool.live() == TX_POOL_LEN {
            if !force {
                return Err(Error::OutOfMemory);
            }
            self.evict_oldest(sink)?;
        }

        let idx = self
            .new_call(action, payload, ids)
            .ok_or(Error::OutOfMemory)?;
        self.ready.push_tail(&mut self.links, idx);
        debug!("{} pushed to ready", action);
        Ok(())
    }

    /// Queue an outbound CALL that becomes eligible to send only after
    /// `delay_secs` have elapsed. A zero delay queues it immediately.
    pub fn push_request_deferred(
        &mut self,
        action: Action,
        payload: Payload,
        delay_secs: u32,
        now: Timestamp,
        ids: &mut impl IdSource,
    ) -> Result<()> {
        let idx = self
            .new_call(action, payload, ids)
            .ok_or(Error::OutOfMemory)?;
        self.pool.slot_mut(idx).expiry = now + u64::from(delay_secs);

        if delay_secs == 0 {
            self.ready.push_tail(&mut self.links, idx);
            debug!("{} pushed to ready", action);
        } else {
            self.timer.push_tail(&mut self.links, idx);
            debug!("{} deferred for {}s", action, delay_secs);
        }
        Ok(())
    }

    /// Queue the response to an incoming CALL. The request's id and action
    /// are copied onto the reply.
    pub fn push_response(
        &mut self,
        request: &Message,
        payload: Payload,
        is_error: bool,
    ) -> Result<()> {
        let idx = self.pool.alloc().ok_or(Error::OutOfMemory)?;

        let slot = self.pool.slot_mut(idx);
        slot.msg.role = if is_error {
            Role::CallError
        } else {
            Role::CallResult
        };
        slot.msg.id = request.id.clone();
        slot.msg.action = request.action;
        slot.msg.payload = payload;

        self.ready.push_tail(&mut self.links, idx);
        debug!("{} response pushed to ready", request.action);
        Ok(())
    }

    /// Messages not yet completed: queued, in flight, or deferred.
    pub fn pending_requests(&self) -> usize {
        self.ready.len() + self.wait.len() + self.timer.len()
    }

    /// Free every pending message of the given action across all queues.
    /// Returns how many were dropped. Useful for clearing stale
    /// StatusNotifications after a reconnect.
    pub fn drop_pending(&mut self, action: Action, sink: &mut impl EventSink) -> usize {
        let mut dropped = 0;

        for which in Queue::ALL {
            let mut cur = self.list(which).head();
            while let Some(idx) = cur {
                cur = self.links[idx as usize].next();
                if self.pool.slot(idx).msg.action != action {
                    continue;
                }
                let (list, links) = self.queue_mut(which);
                list.remove(links, idx);
                self.free_slot(idx, sink);
                dropped += 1;
            }
        }

        if dropped > 0 {
            info!("dropped {} pending {}", dropped, action);
        }
        dropped
    }

    /// Free the oldest Ready message that is safe to shed. BootNotification,
    /// StartTransaction, and StopTransaction are never evicted; if nothing
    /// else is queued the eviction fails.
    pub fn evict_oldest(&mut self, sink: &mut impl EventSink) -> Result<()> {
        let mut cur = self.ready.head();
        while let Some(idx) = cur {
            cur = self.links[idx as usize].next();

            let action = self.pool.slot(idx).msg.action;
            if matches!(
                action,
                Action::BootNotification | Action::StartTransaction | Action::StopTransaction
            ) {
                continue;
            }

            warn!("evicting oldest message: {}", action);
            self.ready.remove(&mut self.links, idx);
            self.free_slot(idx, sink);
            return Ok(());
        }

        Err(Error::OutOfMemory)
    }

    /// Action of the in-flight CALL with this id, if any. Lets the
    /// application interpret a response it does not recognise.
    pub fn action_for_id(&self, id: &str) -> Option<Action> {
        self.find_wait_by_id(id)
            .map(|idx| self.pool.slot(idx).msg.action)
    }

    // ── Snapshot ──────────────────────────────────────────────

    /// Exact buffer size [`save_snapshot`](Engine::save_snapshot) needs.
    pub fn snapshot_size(&self) -> usize {
        snapshot::size(self)
    }

    /// Serialize pool and queue state into `buf`. Returns the number of
    /// bytes written.
    pub fn save_snapshot(&self, buf: &mut [u8]) -> Result<usize> {
        snapshot::save(self, buf)
    }

    /// Rebuild an engine from a snapshot; subsumes [`Engine::new`].
    pub fn restore_snapshot(buf: &[u8]) -> Result<Self> {
        snapshot::restore(buf)
    }

    // ── Internal ──────────────────────────────────────────────

    /// Allocate and initialise an outbound CALL slot. The slot is not yet
    /// linked into any queue.
    fn new_call(
        &mut self,
        action: Action,
        payload: Payload,
        ids: &mut impl IdSource,
    ) -> Option<u8> {
        let idx = self.pool.alloc()?;
        let slot = self.pool.slot_mut(idx);
        slot.msg.role = Role::Call;
        slot.msg.action = action;
        slot.msg.id = ids.next_id();
        slot.msg.payload = payload;
        Some(idx)
    }

    /// Notify the application, then recycle the slot. The caller must have
    /// unlinked it already.
    fn free_slot(&mut self, idx: u8, sink: &mut impl EventSink) {
        sink.emit(EngineEvent::MessageFree(&self.pool.slot(idx).msg));
        self.pool.free(idx);
    }

    fn find_wait_by_id(&self, id: &str) -> Option<u8> {
        self.wait
            .iter(&self.links)
            .find(|&idx| self.pool.slot(idx).msg.id.as_str() == id)
    }

    pub(crate) fn list(&self, which: Queue) -> &List {
        match which {
            Queue::Ready => &self.ready,
            Queue::Wait => &self.wait,
            Queue::Timer => &self.timer,
        }
    }

    fn queue_mut(&mut self, which: Queue) -> (&mut List, &mut [Link; TX_POOL_LEN]) {
        match which {
            Queue::Ready => (&mut self.ready, &mut self.links),
            Queue::Wait => (&mut self.wait, &mut self.links),
            Queue::Timer => (&mut self.timer, &mut self.links),
        }
    }
}
