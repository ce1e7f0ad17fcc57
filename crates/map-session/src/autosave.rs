//! Debounced persistence of graph edits.
//!
//! `Idle -> Pending -> Saving -> Idle`, with `Pending -> Pending` when a new
//! change re-arms the timer. Edits made while a save is in flight re-arm a new
//! timer instead of waiting for the save to finish, so the persisted map
//! converges on the latest state once edits stop for a full delay window.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::timer::{Debouncer, Ticket};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AutosavePhase {
    #[default]
    Idle,
    Pending,
    Saving,
}

#[derive(Debug)]
pub struct AutosaveScheduler {
    delay: Duration,
    timer: Debouncer,
    in_flight: u32,
}

impl AutosaveScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            timer: Debouncer::new(),
            in_flight: 0,
        }
    }

    /// A pending timer is reported ahead of an in-flight save.
    pub fn phase(&self) -> AutosavePhase {
        if self.timer.is_armed() {
            AutosavePhase::Pending
        } else if self.in_flight > 0 {
            AutosavePhase::Saving
        } else {
            AutosavePhase::Idle
        }
    }

    pub fn is_saving(&self) -> bool {
        self.in_flight > 0
    }

    /// Record a model change: cancel any pending timer and arm a fresh one.
    pub fn schedule<T, F>(&mut self, tx: &UnboundedSender<T>, message: F) -> Ticket
    where
        T: Send + 'static,
        F: FnOnce(Ticket) -> T,
    {
        let ticket = self.timer.arm(self.delay, tx, message);
        tracing::trace!(delay_ms = self.delay.as_millis() as u64, "Autosave timer armed");
        ticket
    }

    /// Accept a timer expiry and enter `Saving`. Stale tickets are rejected.
    pub fn begin_save(&mut self, ticket: Ticket) -> bool {
        if !self.timer.fire(ticket) {
            return false;
        }
        self.in_flight += 1;
        true
    }

    /// A save finished, successfully or not.
    pub fn finish_save(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Drop the pending timer and forget in-flight saves.
    pub fn reset(&mut self) {
        self.timer.cancel();
        self.in_flight = 0;
    }

    /// Cancel the pending timer. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.timer.cancel()
    }
}
