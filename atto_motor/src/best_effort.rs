//! Best-effort handling of individual hardware calls.
//!
//! Most device calls made on behalf of the host (enable, stop, home, status
//! reads) do not fail the operation that issued them. The failure is logged
//! with port/channel/operation context and the caller carries on with `None`.

use atto_common::device::DeviceResult;
use tracing::{debug, warn};

/// Unwrap a device result, logging a failure at `warn`.
pub(crate) fn best_effort<T>(
    result: DeviceResult<T>,
    port: &str,
    channel: usize,
    op: &'static str,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(port, channel, op, error = %e, "hardware command failed (best-effort, continuing)");
            None
        }
    }
}

/// Like [`best_effort`] but logs at `debug`. Used on the poll path, which
/// repeats every cycle.
pub(crate) fn best_effort_quiet<T>(
    result: DeviceResult<T>,
    port: &str,
    channel: usize,
    op: &'static str,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(port, channel, op, error = %e, "status read failed");
            None
        }
    }
}
