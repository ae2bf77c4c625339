use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("power supply reply timeout")]
    Timeout,
    #[error("unexpected reply to {command}: {reply:?}")]
    Protocol { command: &'static str, reply: String },
    #[error("setpoint {value} outside device range 0..={limit}")]
    Setpoint { value: f32, limit: f32 },
    #[error("power supply is closed")]
    Closed,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
