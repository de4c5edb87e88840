//! Latest-request-wins bookkeeping shared by the filter coalescer and the report drill-down.
//!
//! Network calls are never cancelled. Each dispatch gets a number, and a result only reaches
//! the screen if its number is the newest one handed out and nothing newer has landed yet.

use std::fmt;
use std::future::Future;

use futures::StreamExt;
use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sequence(u64);

impl Sequence {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct SequenceGate {
    last_dispatched: u64,
    last_applied: u64,
    closed: bool,
}

impl SequenceGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out the next number. Returns `None` once the gate is closed.
    pub fn dispatch(&mut self) -> Option<Sequence> {
        if self.closed {
            return None;
        }
        self.last_dispatched += 1;
        Some(Sequence(self.last_dispatched))
    }

    /// Whether a result for `seq` may be shown. Accepting records it as applied, so a second
    /// delivery of the same number is refused.
    pub fn accept(&mut self, seq: Sequence) -> bool {
        let fresh = !self.closed && seq.0 == self.last_dispatched && seq.0 > self.last_applied;
        if fresh {
            self.last_applied = seq.0;
        } else {
            debug!(%seq, latest = self.last_dispatched, "discarding stale result");
        }
        fresh
    }

    /// Makes every number handed out so far stale without closing the gate.
    pub fn supersede(&mut self) {
        self.last_applied = self.last_dispatched;
    }

    /// True when no result is still owed to the screen: the newest dispatch has landed (or
    /// failed), was superseded, or the gate is closed.
    pub fn is_settled(&self) -> bool {
        self.closed || self.last_applied == self.last_dispatched
    }

    /// Invalidates everything, including future dispatches.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn latest(&self) -> Option<Sequence> {
        (self.last_dispatched > 0).then_some(Sequence(self.last_dispatched))
    }
}

/// Outstanding fetches, each tagged with the sequence it was dispatched under. Polled from a
/// single task; completion order is whatever the network gives us.
pub struct InFlight<T> {
    pending: FuturesUnordered<LocalBoxFuture<'static, (Sequence, anyhow::Result<T>)>>,
}

impl<T: 'static> InFlight<T> {
    pub fn new() -> Self {
        Self {
            pending: FuturesUnordered::new(),
        }
    }

    pub fn push<F>(&mut self, seq: Sequence, fetch: F)
    where
        F: Future<Output = anyhow::Result<T>> + 'static,
    {
        self.pending.push(Box::pin(async move { (seq, fetch.await) }));
    }

    pub async fn next(&mut self) -> Option<(Sequence, anyhow::Result<T>)> {
        self.pending.next().await
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<T: 'static> Default for InFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}
