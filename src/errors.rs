use thiserror::Error;

#[derive(Debug, Error)]
pub enum DemandFlexError {
    #[error("Request was considered invalid due to error: {0}")]
    InvalidRequest(#[from] anyhow::Error),
    #[error("Error identified during demand flexibility calculation: {0}")]
    FailureInCalculation(#[from] CalculationError),
    #[error("Error while writing outputs: {0}")]
    ErrorInOutput(OutputError),
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct CalculationError {
    error: anyhow::Error,
}

impl CalculationError {
    pub(crate) fn new(error: anyhow::Error) -> Self {
        Self { error }
    }
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct OutputError {
    error: anyhow::Error,
}

impl OutputError {
    pub fn new(error: anyhow::Error) -> Self {
        Self { error }
    }
}

/// Errors raised when an annual series does not sit on one of the supported calendar grids.
/// These are fatal to a run.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("Series of length {length} does not fit a supported calendar grid ({expected})")]
    InvalidSeriesLength { length: usize, expected: String },
    #[error("Resampling a series of length {from} to length {to} is not supported")]
    UnsupportedInterval { from: usize, to: usize },
}

impl SeriesError {
    pub(crate) fn invalid_length(length: usize) -> Self {
        Self::InvalidSeriesLength {
            length,
            expected: "one of 8760, 8784, 35040 or 35136 values".to_string(),
        }
    }
}

/// A thermostat or light that lacks the schedule it is expected to carry.
///
/// Recovered locally: the owning object is skipped and counted in the run summary.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{owner} has no {role} schedule{}", .schedule.as_ref().map(|name| format!(" named '{name}'")).unwrap_or_default())]
pub struct ScheduleMissingError {
    pub owner: String,
    pub role: &'static str,
    pub schedule: Option<String>,
}

impl ScheduleMissingError {
    pub(crate) fn new(owner: &str, role: &'static str, schedule: Option<&str>) -> Self {
        Self {
            owner: owner.to_string(),
            role,
            schedule: schedule.map(String::from),
        }
    }
}

/// Problems with a model description that are caught before any calculation starts.
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("Invalid demand flexibility settings: {0}")]
    InvalidSettings(String),
    #[error("Load prediction method '{method}' needs outdoor air temperatures, but none were provided")]
    MissingAirTemperatures { method: String },
    #[error("Load prediction method '{method}' needs a load model, but none was provided")]
    MissingLoadModel { method: String },
}
