use thiserror::Error;

/// Invalid or incomplete battery profile data. Not retryable without an
/// operator correcting the configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("battery capacity is not set")]
    MissingCapacity,
    #[error("battery capacity must be a positive number of Ah, got {0}")]
    InvalidCapacity(f32),
    #[error("voltage window is invalid: min {min} V must be below max {max} V")]
    InvalidVoltageWindow { min: f32, max: f32 },
    #[error("{table} table is missing SOC bucket {bucket}")]
    MissingBucket { table: &'static str, bucket: u8 },
    #[error("{table} table has unexpected SOC bucket {bucket} (expected 0..=100 step 10)")]
    UnexpectedBucket { table: &'static str, bucket: u8 },
    #[error("SOC_OCV table is not strictly increasing at bucket {bucket}")]
    NonMonotonicTable { bucket: u8 },
    #[error("{field} must be a positive, finite C-rate")]
    InvalidRate { field: &'static str },
    #[error("charge rate at SOC {bucket} exceeds the maximum charge rate")]
    RateAboveMax { bucket: u8 },
    #[error("cutoff rate must be below the maximum charge rate")]
    CutoffAboveMax,
    #[error("unknown battery profile '{0}'")]
    UnknownProfile(String),
}

/// A safety bound was violated by the present measurement.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SafetyError {
    #[error("voltage out of range: {min} V <= {observed} V <= {max} V does not hold")]
    VoltageOutOfRange { observed: f32, min: f32, max: f32 },
    #[error("current out of range: {min} A <= {observed} A <= {max} A does not hold")]
    CurrentOutOfRange { observed: f32, min: f32, max: f32 },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChargerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("safety abort: {0}")]
    OutOfRange(#[from] SafetyError),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("timeout talking to power supply")]
    Timeout,
    #[error("no battery profile selected")]
    NotConfigured,
    #[error("charge cancelled by operator")]
    Cancelled,
    #[error("max run time exceeded")]
    MaxRuntime,
    #[error("invalid state: {0}")]
    State(String),
}

impl ChargerError {
    /// Stable short name for logs and structured output.
    pub fn reason_name(&self) -> &'static str {
        match self {
            Self::Config(_) => "Config",
            Self::OutOfRange(SafetyError::VoltageOutOfRange { .. }) => "VoltageOutOfRange",
            Self::OutOfRange(SafetyError::CurrentOutOfRange { .. }) => "CurrentOutOfRange",
            Self::Hardware(_) => "Hardware",
            Self::Timeout => "Timeout",
            Self::NotConfigured => "NotConfigured",
            Self::Cancelled => "Cancelled",
            Self::MaxRuntime => "MaxRuntime",
            Self::State(_) => "State",
        }
    }
}

/// Controller construction failed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
