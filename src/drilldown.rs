//! Drill-down from a monthly report bucket to the transactions behind it.
//!
//! The report total is authoritative. Detail records are fetched for the whole month, narrowed
//! to the selected label here, summed, and compared against the bucket. A mismatch is shown
//! with a warning instead of being hidden or corrected.

use std::future::Future;
use std::pin::pin;

use futures::{Stream, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::client::{Report, Transaction};
use crate::outcome::{Failure, IntegrityWarning, Outcome};
use crate::sequence::{InFlight, Sequence, SequenceGate};
use crate::types::Period;

/// Largest difference between a bucket total and its records that still counts as a match.
pub fn tolerance() -> Decimal {
    Decimal::new(1, 2)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRequest {
    pub seq: Sequence,
    pub period: Period,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Drilldown {
    pub label: String,
    pub period: Period,
    pub records: Vec<Transaction>,
    pub expected: Decimal,
    pub actual: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrilldownError {
    #[error("no `{label}` bucket in the {period} report")]
    UnknownBucket { label: String, period: Period },
    #[error("the loaded report is for {loaded}, not {requested}")]
    PeriodMismatch { requested: Period, loaded: Period },
    #[error("drill-down view is closed")]
    Closed,
}

#[derive(Debug)]
struct Selection {
    seq: Sequence,
    label: String,
    expected: Decimal,
}

#[derive(Debug)]
pub struct DrilldownCoordinator {
    period: Period,
    report: Report,
    gate: SequenceGate,
    selection: Option<Selection>,
    displayed: Option<Drilldown>,
}

impl DrilldownCoordinator {
    pub fn new(period: Period, report: Report) -> Self {
        Self {
            period,
            report,
            gate: SequenceGate::new(),
            selection: None,
            displayed: None,
        }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Starts a drill-down into `label`. Whatever was shown before is cleared and any fetch
    /// still outstanding for an earlier selection will be dropped when it lands.
    pub fn select_bucket(
        &mut self,
        label: &str,
        period: Period,
    ) -> Result<DetailRequest, DrilldownError> {
        if self.gate.is_closed() {
            return Err(DrilldownError::Closed);
        }
        self.displayed = None;
        self.selection = None;
        self.gate.supersede();

        if period != self.period {
            return Err(DrilldownError::PeriodMismatch {
                requested: period,
                loaded: self.period,
            });
        }
        let bucket = self
            .report
            .bucket(label)
            .ok_or_else(|| DrilldownError::UnknownBucket {
                label: label.trim().to_string(),
                period,
            })?;

        let seq = self.gate.dispatch().ok_or(DrilldownError::Closed)?;
        debug!(%seq, label = %bucket.category_label, %period, "drill-down requested");
        self.selection = Some(Selection {
            seq,
            label: bucket.category_label.clone(),
            expected: bucket.total,
        });
        Ok(DetailRequest {
            seq,
            period,
            label: bucket.category_label,
        })
    }

    /// Feeds back the month's transactions for request `seq`.
    pub fn complete(
        &mut self,
        seq: Sequence,
        result: anyhow::Result<Vec<Transaction>>,
    ) -> Option<Outcome<Drilldown>> {
        if !self.gate.accept(seq) {
            return None;
        }
        let selection = self.selection.as_ref().filter(|s| s.seq == seq)?;

        let records = match result {
            Ok(records) => records,
            Err(err) => return Some(Outcome::Failed(Failure::transient(&err))),
        };

        let records: Vec<Transaction> = records
            .into_iter()
            .filter(|t| t.category_label() == selection.label)
            .collect();
        let actual: Decimal = records.iter().map(Transaction::amount).sum();
        let drilldown = Drilldown {
            label: selection.label.clone(),
            period: self.period,
            records,
            expected: selection.expected,
            actual,
        };
        self.displayed = Some(drilldown.clone());

        if (drilldown.expected - actual).abs() <= tolerance() {
            Some(Outcome::Ready(drilldown))
        } else {
            let warning = IntegrityWarning {
                label: drilldown.label.clone(),
                expected: drilldown.expected,
                actual,
            };
            warn!(%warning, period = %self.period, "report total disagrees with detail records");
            Some(Outcome::Flagged {
                data: drilldown,
                warning,
            })
        }
    }

    /// Switches to another month's report. Any outstanding selection is invalidated.
    pub fn replace_report(&mut self, period: Period, report: Report) {
        debug!(from = %self.period, to = %period, "report replaced");
        self.period = period;
        self.report = report;
        self.selection = None;
        self.displayed = None;
        self.gate.supersede();
    }

    pub fn displayed(&self) -> Option<&Drilldown> {
        self.displayed.as_ref()
    }

    pub fn is_settled(&self) -> bool {
        self.gate.is_settled()
    }

    pub fn close(&mut self) {
        self.selection = None;
        self.gate.close();
    }
}

#[derive(Debug, Clone)]
pub enum DrilldownCommand {
    /// Drill into a bucket of the currently loaded report.
    Select(String),
    Replace { period: Period, report: Report },
}

/// Applies `commands` in order until the stream ends and the last selection has landed.
///
/// Refused selections are reported through `on_outcome` as non-retryable failures.
pub async fn drive<S, F, Fut>(
    coordinator: &mut DrilldownCoordinator,
    commands: S,
    mut fetch: F,
    mut on_outcome: impl FnMut(&Outcome<Drilldown>),
) where
    S: Stream<Item = DrilldownCommand>,
    F: FnMut(DetailRequest) -> Fut,
    Fut: Future<Output = anyhow::Result<Vec<Transaction>>> + 'static,
{
    let mut commands = pin!(commands);
    let mut in_flight = InFlight::new();
    let mut input_open = true;

    loop {
        if !input_open && coordinator.is_settled() {
            break;
        }

        tokio::select! {
            command = commands.next(), if input_open => match command {
                Some(DrilldownCommand::Select(label)) => {
                    let period = coordinator.period();
                    match coordinator.select_bucket(&label, period) {
                        Ok(request) => {
                            let seq = request.seq;
                            in_flight.push(seq, fetch(request));
                        }
                        Err(err) => on_outcome(&Outcome::Failed(Failure::rejected(err.to_string()))),
                    }
                }
                Some(DrilldownCommand::Replace { period, report }) => {
                    coordinator.replace_report(period, report);
                }
                None => input_open = false,
            },
            Some((seq, result)) = in_flight.next(), if !in_flight.is_empty() => {
                if let Some(outcome) = coordinator.complete(seq, result) {
                    on_outcome(&outcome);
                }
            }
            else => break,
        }
    }

    coordinator.close();
}
