//! Cancelable one-shot timers for the session loop.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Identifies one arming of a [`Debouncer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Owns at most one pending timer task.
///
/// Arming replaces (and aborts) the previous timer. When the timer expires it
/// posts a message carrying its [`Ticket`]; the owner accepts it through
/// [`Debouncer::fire`], which rejects tickets from replaced timers. Dropping
/// the debouncer aborts the pending task.
#[derive(Debug, Default)]
pub struct Debouncer {
    next: u64,
    pending: Option<(Ticket, JoinHandle<()>)>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer, replacing any pending one.
    pub fn arm<T, F>(&mut self, delay: Duration, tx: &UnboundedSender<T>, message: F) -> Ticket
    where
        T: Send + 'static,
        F: FnOnce(Ticket) -> T,
    {
        self.cancel();
        self.next += 1;
        let ticket = Ticket(self.next);
        let msg = message(ticket);
        let tx = tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the session was torn down.
            let _ = tx.send(msg);
        });
        self.pending = Some((ticket, handle));
        ticket
    }

    /// Abort the pending timer. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Accept an expiry. Only the ticket of the currently pending timer is accepted.
    pub fn fire(&mut self, ticket: Ticket) -> bool {
        match &self.pending {
            Some((current, _)) if *current == ticket => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
