//! Waiters, capacity reservations and direct handoff.
//!
//! A queued acquire is a [`Waiter`] holding the sending half of a oneshot
//! channel. Whenever capacity frees up, the pool dequeues the next waiter
//! and sends it a [`Grant`]: either a ready lease (a released resource
//! passed straight on) or a [`Reservation`] that the waiter's own task
//! spends on `Factory::create`. A grant whose waiter has gone away comes
//! back from `send` and is offered to the next waiter, or parked.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::Instant;

use super::shared::Shared;
use crate::error::{Error, Result};
use crate::factory::Factory;
use crate::lease::Lease;
use crate::logging::LogLevel;

/// What a waiter receives.
pub(crate) enum Grant<F: Factory> {
    /// A released resource, handed over without touching the idle set.
    Lease(Lease<F>),
    /// Room to create a new resource.
    Create(Reservation<F>),
    /// The pool started draining.
    Rejected(Error),
}

/// A queued acquire request.
pub(crate) struct Waiter<F: Factory> {
    pub(crate) sender: oneshot::Sender<Grant<F>>,
}

impl<F: Factory> Waiter<F> {
    /// Whether the requesting future was dropped.
    pub(crate) fn is_abandoned(&self) -> bool {
        self.sender.is_closed()
    }
}

/// One unit of capacity counted in `State::creating`.
///
/// Dropping an armed reservation hands the capacity to the next waiter, or
/// returns it to the pool, so a cancelled creation never leaks a slot.
pub(crate) struct Reservation<F: Factory> {
    shared: Arc<Shared<F>>,
    armed: bool,
}

impl<F: Factory> Reservation<F> {
    /// The caller must already have incremented `State::creating`.
    pub(crate) fn new(shared: Arc<Shared<F>>) -> Self {
        Self {
            shared,
            armed: true,
        }
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }

    /// Create the resource this reservation was made for.
    pub(crate) async fn fulfil(mut self) -> Result<Lease<F>> {
        let shared = Arc::clone(&self.shared);
        match shared.factory.create().await {
            Ok(resource) => {
                let id = {
                    let mut state = shared.state.lock();
                    state.creating -= 1;
                    state.counters.created += 1;
                    let id = state.next_resource_id();
                    state.in_use.insert(id);
                    id
                };
                self.disarm();
                shared.log(LogLevel::Info, format_args!("created resource {id}"));
                Ok(Lease::new(id, resource, Instant::now(), shared))
            }
            Err(err) => {
                shared.log(
                    LogLevel::Error,
                    format_args!("failed to create resource: {err}"),
                );
                drop(self);
                Err(err)
            }
        }
    }
}

impl<F: Factory> Drop for Reservation<F> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        let transferred = Self::new(Arc::clone(&self.shared));
        self.shared.hand_off(Grant::Create(transferred));
    }
}

impl<F: Factory> Shared<F> {
    /// Give `grant` to the most urgent live waiter, or park it.
    ///
    /// The dequeue and the park decision happen under one lock, so a grant
    /// is never parked while a waiter is queued. Sending happens outside the
    /// lock because a refused grant may be dropped by the receiving side.
    pub(crate) fn hand_off(self: &Arc<Self>, mut grant: Grant<F>) {
        loop {
            let waiter = {
                let mut state = self.state.lock();
                match state.pending.dequeue() {
                    Some(waiter) => waiter,
                    None => {
                        state.park(grant, &self.config);
                        drop(state);
                        self.settled.notify_waiters();
                        return;
                    }
                }
            };

            let leased = match &grant {
                Grant::Lease(lease) => Some(lease.id()),
                Grant::Create(_) | Grant::Rejected(_) => None,
            };
            match waiter.sender.send(grant) {
                Ok(()) => {
                    match leased {
                        Some(id) => self.log(
                            LogLevel::Verbose,
                            format_args!("handed resource {id} to the next waiter"),
                        ),
                        None => self.log(
                            LogLevel::Verbose,
                            format_args!("handed capacity for a new resource to the next waiter"),
                        ),
                    }
                    return;
                }
                Err(returned) => {
                    self.log(
                        LogLevel::Verbose,
                        format_args!("skipped an abandoned waiter"),
                    );
                    grant = returned;
                }
            }
        }
    }
}
