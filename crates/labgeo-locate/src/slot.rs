//! Single-slot task supervision: at most one outstanding operation per slot.
//!
//! Beginning a new operation cancels the token of the previous one, so an
//! older, slower sequence can never commit after a newer one has started.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct TaskSlot {
    state: Mutex<SlotState>,
}

#[derive(Debug, Default)]
struct SlotState {
    generation: u64,
    active: Option<CancellationToken>,
}

/// Handle for the operation that currently owns a [`TaskSlot`].
#[derive(Debug)]
pub struct SlotTicket<'a> {
    slot: &'a TaskSlot,
    generation: u64,
    token: CancellationToken,
}

impl TaskSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel whatever is outstanding and hand out a fresh ticket.
    pub fn begin(&self) -> SlotTicket<'_> {
        let mut state = self.lock();
        if let Some(previous) = state.active.take() {
            previous.cancel();
            tracing::debug!(
                superseded_generation = state.generation,
                "cancelled outstanding location request"
            );
        }
        state.generation += 1;
        let token = CancellationToken::new();
        state.active = Some(token.clone());
        SlotTicket {
            slot: self,
            generation: state.generation,
            token,
        }
    }

    /// Cancel the outstanding operation, if any.
    pub fn cancel(&self) {
        if let Some(active) = self.lock().active.take() {
            active.cancel();
        }
    }

    #[must_use]
    pub fn has_outstanding(&self) -> bool {
        self.lock().active.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SlotTicket<'_> {
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// `true` while no newer ticket was issued and this one was not cancelled.
    #[must_use]
    pub fn is_current(&self) -> bool {
        !self.token.is_cancelled() && self.slot.lock().generation == self.generation
    }
}

impl Drop for SlotTicket<'_> {
    fn drop(&mut self) {
        let mut state = self.slot.lock();
        if state.generation == self.generation {
            state.active = None;
        }
    }
}
