//! Bounded per-lobby event history for resume replay.
//!
//! Every mutation a lobby broadcasts is also appended here with a
//! monotonically increasing sequence number. A resuming client reports the
//! last sequence it saw; if the gap still fits in the window it gets the
//! missed events in order, otherwise it gets a fresh snapshot and starts
//! over from the current sequence.

use std::collections::{HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use greenroom_protocol::{EventKind, LobbyEvent, LobbyId};

/// How many events each lobby retains. Covers roughly a minute of even a
/// busy lobby, which matches the disconnect grace period.
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Outcome of a replay request.
#[derive(Debug)]
pub enum Replay {
    /// The gap fits in the window: deliver these events in order.
    Events(Vec<LobbyEvent>),
    /// The gap is too old. The caller sends a full snapshot instead and
    /// the client discards its local event history.
    SnapshotOnly,
}

/// Per-lobby ring buffers of recent events.
pub struct EventLog {
    buffers: HashMap<LobbyId, LobbyBuffer>,
    capacity: usize,
}

struct LobbyBuffer {
    events: VecDeque<LobbyEvent>,
    next_seq: u64,
}

impl LobbyBuffer {
    fn new() -> Self {
        Self {
            events: VecDeque::new(),
            next_seq: 1,
        }
    }
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            capacity,
        }
    }

    /// Appends an event for a lobby, assigning it the next sequence number.
    /// The oldest event is evicted once the buffer is full.
    ///
    /// Returns the stamped event so the caller can broadcast the exact
    /// same payload it logged.
    pub fn append(&mut self, lobby_id: LobbyId, kind: EventKind) -> LobbyEvent {
        let buffer = self
            .buffers
            .entry(lobby_id)
            .or_insert_with(LobbyBuffer::new);

        let event = LobbyEvent {
            seq: buffer.next_seq,
            timestamp_ms: now_ms(),
            kind,
        };
        buffer.next_seq += 1;

        if buffer.events.len() == self.capacity {
            buffer.events.pop_front();
        }
        buffer.events.push_back(event.clone());

        event
    }

    /// Events after `last_seen_seq` for a lobby, oldest first.
    ///
    /// `last_seen_seq == 0` means the client has seen nothing. If the
    /// requested starting point has already been evicted the client cannot
    /// be caught up incrementally and gets [`Replay::SnapshotOnly`].
    pub fn since(&self, lobby_id: LobbyId, last_seen_seq: u64) -> Replay {
        let Some(buffer) = self.buffers.get(&lobby_id) else {
            // No events logged yet; nothing was missed.
            return Replay::Events(Vec::new());
        };

        if last_seen_seq + 1 >= buffer.next_seq {
            return Replay::Events(Vec::new());
        }

        match buffer.events.front() {
            Some(oldest) if last_seen_seq + 1 >= oldest.seq => {
                let events = buffer
                    .events
                    .iter()
                    .filter(|e| e.seq > last_seen_seq)
                    .cloned()
                    .collect();
                Replay::Events(events)
            }
            // The client's last seen event fell off the buffer.
            _ => Replay::SnapshotOnly,
        }
    }

    /// The sequence number of the latest event for a lobby, 0 if none.
    pub fn current_seq(&self, lobby_id: LobbyId) -> u64 {
        self.buffers
            .get(&lobby_id)
            .map(|b| b.next_seq - 1)
            .unwrap_or(0)
    }

    /// Discards all history for a lobby. Called when the lobby is removed.
    pub fn drop_lobby(&mut self, lobby_id: LobbyId) {
        self.buffers.remove(&lobby_id);
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// =========================================================================
// Tests
// =========================================================================
