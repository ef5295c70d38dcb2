//! Turn ownership and the per-call turn mailbox.
//!
//! The interaction counter decides which turn may stream outbound audio: a
//! playback batch tagged `i` is current only while the counter equals `i`.
//! Pending turns wait in a single slot. Posting a new turn advances the
//! counter past whatever turn is in flight, which silences its playback at
//! the next frame, and replaces any turn that has not started yet.

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

/// Work item for the turn worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnRequest {
    /// Fixed greeting played once recognition is ready.
    Greeting,
    /// A finalized, non-empty caller utterance.
    Transcript(String),
}

#[derive(Debug, Default)]
struct TurnState {
    counter: u64,
    in_flight: Option<u64>,
    pending: Option<TurnRequest>,
}

/// Owns the interaction counter and the single-slot turn mailbox.
#[derive(Debug, Default)]
pub struct TurnSequencer {
    state: Mutex<TurnState>,
    notify: Notify,
}

impl TurnSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of the interaction counter.
    pub fn counter(&self) -> u64 {
        self.state.lock().counter
    }

    /// Index of the turn currently executing, if any.
    pub fn in_flight(&self) -> Option<u64> {
        self.state.lock().in_flight
    }

    pub fn has_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    /// Post a turn, preempting the one in flight.
    ///
    /// Returns true if an in-flight turn was preempted.
    pub fn submit(&self, request: TurnRequest) -> bool {
        let preempted = {
            let mut state = self.state.lock();
            let preempted = match state.in_flight {
                Some(index) if state.counter == index => {
                    state.counter += 1;
                    true
                }
                _ => false,
            };
            if let Some(replaced) = state.pending.replace(request) {
                debug!("Replacing turn that never started: {:?}", replaced);
            }
            preempted
        };
        self.notify.notify_one();
        preempted
    }

    /// Claim the pending turn, if any, tagging it with the current counter.
    pub fn try_begin(&self) -> Option<(u64, TurnRequest)> {
        let mut state = self.state.lock();
        let request = state.pending.take()?;
        let index = state.counter;
        state.in_flight = Some(index);
        Some((index, request))
    }

    /// Wait for the next turn and claim it.
    pub async fn next_turn(&self) -> (u64, TurnRequest) {
        loop {
            if let Some(turn) = self.try_begin() {
                return turn;
            }
            self.notify.notified().await;
        }
    }

    /// Whether batch `index` still owns outbound audio.
    pub fn still_current(&self, index: u64) -> bool {
        self.state.lock().counter == index
    }

    /// Complete turn `index`. The counter advances by one unless a
    /// preemption already moved it.
    pub fn finish(&self, index: u64) {
        let mut state = self.state.lock();
        if state.counter == index {
            state.counter += 1;
        }
        if state.in_flight == Some(index) {
            state.in_flight = None;
        }
    }

    /// Drop any turn that has not started.
    pub fn clear_pending(&self) {
        self.state.lock().pending = None;
    }
}
