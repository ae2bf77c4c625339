//! Classifies errors crossing the `PowerSupply` boundary.
//!
//! A supply that stops answering is reported as `ChargerError::Timeout`;
//! everything else becomes `ChargerError::Hardware` with the driver's message.

use std::io;

use crate::error::ChargerError;

/// Turn a driver error into a typed `ChargerError`.
///
/// Known driver types are matched first (`charger_hardware::HwError` behind
/// the `hardware-errors` feature), then any `io::Error` in the source chain,
/// then the message text.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ChargerError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<charger_hardware::HwError>() {
            use charger_hardware::HwError;
            return match hw {
                HwError::Timeout => ChargerError::Timeout,
                HwError::Io(io) if is_timeout_kind(io) => ChargerError::Timeout,
                other => ChargerError::Hardware(other.to_string()),
            };
        }
    }

    let mut cur = Some(e);
    while let Some(err) = cur {
        if err.downcast_ref::<io::Error>().is_some_and(is_timeout_kind) {
            return ChargerError::Timeout;
        }
        cur = err.source();
    }

    let msg = e.to_string();
    let lower = msg.to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        ChargerError::Timeout
    } else {
        ChargerError::Hardware(msg)
    }
}

fn is_timeout_kind(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::TimedOut
}
