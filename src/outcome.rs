use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// What a coalesced fetch or a drill-down hands to whatever is rendering it.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ready(T),
    /// The data is shown anyway; the warning tells the user not to trust it blindly.
    Flagged {
        data: T,
        warning: IntegrityWarning,
    },
    Failed(Failure),
}

impl<T> Outcome<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            Outcome::Ready(data) | Outcome::Flagged { data, .. } => Some(data),
            Outcome::Failed(_) => None,
        }
    }

    pub fn warning(&self) -> Option<&IntegrityWarning> {
        match self {
            Outcome::Flagged { warning, .. } => Some(warning),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Failed(f) => Some(f),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct Failure {
    pub reason: String,
    pub retryable: bool,
}

impl Failure {
    /// A fetch that failed in transit; trying again may work.
    pub fn transient(err: &anyhow::Error) -> Self {
        Self {
            reason: format!("{err:#}"),
            retryable: true,
        }
    }

    /// A request the client refused to send.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retryable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error(
    "figures may be out of date: the report shows {expected} for {label} but its transactions add up to {actual}"
)]
pub struct IntegrityWarning {
    pub label: String,
    pub expected: Decimal,
    pub actual: Decimal,
}
