/// Error types the presentation layer matches on.
///
/// Storage and I/O failures stay as `anyhow::Error`; these enums only cover
/// outcomes that turn into a specific chat reply.
use chrono::NaiveDate;
use thiserror::Error;

use crate::backfill::BackfillReport;

/// Bad user input. Always reported back to the caller, never mutates state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("start date {start} is after end date {end}")]
    StartAfterEnd { start: NaiveDate, end: NaiveDate },

    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("invalid message limit '{0}', expected a positive number")]
    InvalidLimit(String),

    #[error("unexpected argument '{0}'")]
    UnexpectedArgument(String),
}

/// A backfill that stopped part way through.
///
/// `report` holds the channels that were already folded in and saved before
/// the failure; those stay committed.
#[derive(Debug, Error)]
#[error("message collection failed: {cause:#}")]
pub struct BackfillError {
    pub report: BackfillReport,
    pub cause: anyhow::Error,
}

/// Everything a chat command can fail with.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("'{0}' is only available to administrators")]
    Denied(&'static str),

    #[error("unknown command '{0}'")]
    Unknown(String),

    #[error(transparent)]
    Backfill(#[from] BackfillError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
