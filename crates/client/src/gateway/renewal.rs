//! Single-flight coordination of access token renewal
//!
//! The first request that hits an authorization failure becomes the leader and
//! performs the renewal call. Requests failing while that call is in flight
//! become waiters: they park on a oneshot channel and are released, in
//! enqueue order, with exactly the leader's outcome.
//!
//! The in-progress flag and the waiter list live under one mutex that is never
//! held across an await, so draining the waiters and resetting the flag is a
//! single atomic step. The leader holds a [`RenewalGuard`]; dropping it without
//! settling (the leader's future was cancelled) still resets the flag and
//! releases the waiters, who then observe a closed channel.

use crate::error::ClientError;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

/// What every participant of one renewal observes
pub type RenewalOutcome = Result<String, Arc<ClientError>>;

#[derive(Debug, Default)]
struct RenewalState {
    in_progress: bool,
    waiters: Vec<oneshot::Sender<RenewalOutcome>>,
}

/// Renewal flag plus the queue of requests waiting on it
#[derive(Debug, Default)]
pub struct RenewalCoordinator {
    state: Mutex<RenewalState>,
}

/// Role assigned to a request that needs a fresh token
#[derive(Debug)]
pub enum Ticket<'a> {
    /// No renewal was running; the holder must perform it and settle the guard
    Leader(RenewalGuard<'a>),
    /// A renewal is already running; await its outcome
    Waiter(Waiter),
}

impl RenewalCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the current renewal, or start one if none is running
    pub fn join(&self) -> Ticket<'_> {
        let mut state = self.lock();
        if state.in_progress {
            let (sender, receiver) = oneshot::channel();
            state.waiters.push(sender);
            Ticket::Waiter(Waiter { receiver })
        } else {
            state.in_progress = true;
            Ticket::Leader(RenewalGuard {
                coordinator: self,
                settled: false,
            })
        }
    }

    /// Whether a renewal call is in flight
    pub fn in_progress(&self) -> bool {
        self.lock().in_progress
    }

    /// Number of requests parked on the current renewal
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RenewalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, outcome: Option<&RenewalOutcome>) -> usize {
        let waiters = {
            let mut state = self.lock();
            state.in_progress = false;
            std::mem::take(&mut state.waiters)
        };
        let released = waiters.len();
        if let Some(outcome) = outcome {
            for waiter in waiters {
                // A waiter whose request was dropped is simply gone
                let _ = waiter.send(outcome.clone());
            }
        }
        released
    }
}

/// Proof of renewal leadership
///
/// Settling or dropping the guard ends the renewal.
#[derive(Debug)]
pub struct RenewalGuard<'a> {
    coordinator: &'a RenewalCoordinator,
    settled: bool,
}

impl RenewalGuard<'_> {
    /// Release every waiter with `outcome` and reset the in-progress flag.
    /// Returns how many waiters were released.
    pub fn settle(mut self, outcome: RenewalOutcome) -> usize {
        self.settled = true;
        self.coordinator.release(Some(&outcome))
    }
}

impl Drop for RenewalGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.release(None);
        }
    }
}

/// A request parked on someone else's renewal
#[derive(Debug)]
pub struct Waiter {
    receiver: oneshot::Receiver<RenewalOutcome>,
}

impl Waiter {
    /// New access token, or the shared renewal error
    pub async fn outcome(self) -> Result<String, ClientError> {
        match self.receiver.await {
            Ok(Ok(token)) => Ok(token),
            Ok(Err(error)) => Err(ClientError::RenewalFailed(error)),
            Err(_) => Err(ClientError::RenewalInterrupted),
        }
    }
}
