use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Fill `buf` from `port`, or fail with `HwError::Timeout` once `timeout`
/// expires. Empty and would-block reads sleep `poll_interval` instead of
/// spinning.
pub fn read_exact_with_timeout(
    port: &mut impl Read,
    buf: &mut [u8],
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let mut filled = 0;
    while filled < buf.len() {
        match port.read(&mut buf[filled..]) {
            Ok(0) => {}
            Ok(n) => {
                filled += n;
                continue;
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(HwError::Io(e)),
        }
        if Instant::now() >= deadline {
            return Err(HwError::Timeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}
