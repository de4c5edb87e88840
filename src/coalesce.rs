//! Debounced, latest-wins fetching for filter-driven views.
//!
//! [`QueryCoalescer`] is a plain state machine: `schedule` → (quiet period) → `fire` →
//! `complete`, plus `teardown`. Time is passed in by the caller so the transitions can be
//! driven by hand in tests. [`drive`] runs it on a tokio current-thread runtime.

use std::future::{Future, pending};
use std::pin::pin;
use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};
use tracing::{debug, trace};

use crate::outcome::{Failure, Outcome};
use crate::sequence::{InFlight, Sequence, SequenceGate};

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch<C> {
    pub seq: Sequence,
    pub criteria: C,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Displayed<T> {
    pub seq: Sequence,
    pub data: T,
    /// Set when a newer fetch failed; the data is from an older filter state.
    pub stale: bool,
}

#[derive(Debug)]
pub struct QueryCoalescer<C, T> {
    quiet_period: Duration,
    pending: Option<C>,
    deadline: Option<Instant>,
    gate: SequenceGate,
    displayed: Option<Displayed<T>>,
}

impl<C, T: Clone> QueryCoalescer<C, T> {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            pending: None,
            deadline: None,
            gate: SequenceGate::new(),
            displayed: None,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Records `criteria` as the newest filter state and restarts the quiet period.
    pub fn schedule(&mut self, criteria: C, now: Instant) {
        if self.gate.is_closed() {
            trace!("schedule after teardown ignored");
            return;
        }
        if self.pending.replace(criteria).is_some() {
            trace!("superseded pending criteria");
        }
        self.deadline = Some(now + self.quiet_period);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn pending(&self) -> Option<&C> {
        self.pending.as_ref()
    }

    /// Takes the pending criteria once the quiet period has elapsed and numbers the fetch.
    pub fn fire(&mut self, now: Instant) -> Option<Dispatch<C>> {
        match self.deadline {
            Some(at) if at <= now => {}
            _ => return None,
        }
        self.deadline = None;
        let criteria = self.pending.take()?;
        let seq = self.gate.dispatch()?;
        debug!(%seq, "dispatching coalesced fetch");
        Some(Dispatch { seq, criteria })
    }

    /// Feeds back a fetch result. Returns what to show, or `None` when the result belongs to a
    /// superseded dispatch and must be dropped.
    pub fn complete(&mut self, seq: Sequence, result: anyhow::Result<T>) -> Option<Outcome<T>> {
        if !self.gate.accept(seq) {
            return None;
        }
        match result {
            Ok(data) => {
                self.displayed = Some(Displayed {
                    seq,
                    data: data.clone(),
                    stale: false,
                });
                Some(Outcome::Ready(data))
            }
            Err(err) => {
                debug!(%seq, error = %err, "latest fetch failed");
                if let Some(d) = self.displayed.as_mut() {
                    d.stale = true;
                }
                Some(Outcome::Failed(Failure::transient(&err)))
            }
        }
    }

    pub fn displayed(&self) -> Option<&Displayed<T>> {
        self.displayed.as_ref()
    }

    /// True when nothing is waiting to be shown: no pending timer and no result owed for the
    /// newest dispatch.
    pub fn is_idle(&self) -> bool {
        self.deadline.is_none() && self.gate.is_settled()
    }

    /// The owning view is going away: drop the timer and refuse every result from now on.
    pub fn teardown(&mut self) {
        self.pending = None;
        self.deadline = None;
        self.gate.close();
    }

    pub fn is_torn_down(&self) -> bool {
        self.gate.is_closed()
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Runs a coalescer until `edits` ends and the newest filter state has been shown.
///
/// Every item from `edits` is a complete filter state. `fetch` is called at most once per
/// quiet period, and `on_commit` only ever sees the result for the newest dispatch. Fetches
/// for older dispatches keep running but their results are dropped. Returns with the
/// coalescer torn down.
pub async fn drive<C, T, S, F, Fut>(
    coalescer: &mut QueryCoalescer<C, T>,
    edits: S,
    mut fetch: F,
    mut on_commit: impl FnMut(&Outcome<T>),
) where
    T: Clone + 'static,
    S: Stream<Item = C>,
    F: FnMut(C) -> Fut,
    Fut: Future<Output = anyhow::Result<T>> + 'static,
{
    let mut edits = pin!(edits);
    let mut in_flight = InFlight::new();
    let mut input_open = true;

    loop {
        if !input_open && coalescer.is_idle() {
            break;
        }

        let deadline = coalescer.deadline();
        let timer = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            edit = edits.next(), if input_open => match edit {
                Some(criteria) => coalescer.schedule(criteria, now()),
                None => input_open = false,
            },
            () = timer => {
                if let Some(dispatch) = coalescer.fire(now()) {
                    in_flight.push(dispatch.seq, fetch(dispatch.criteria));
                }
            }
            Some((seq, result)) = in_flight.next(), if !in_flight.is_empty() => {
                if let Some(outcome) = coalescer.complete(seq, result) {
                    on_commit(&outcome);
                }
            }
        }
    }

    if !in_flight.is_empty() {
        debug!(abandoned = in_flight.len(), "view closed with superseded fetches in flight");
    }
    coalescer.teardown();
}
