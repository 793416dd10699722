use thiserror::Error;

/// Errors that can occur when constructing or interpreting cached events.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("event ends before it starts: start {start}, end {end}")]
    TimeOrder { start: String, end: String },
    #[error("unparseable instant: {0}")]
    InvalidInstant(String),
    #[error("local time does not exist in the target zone: {0}")]
    NonexistentLocalTime(String),
}
