//! Maps download failures to terminal error states.
//!
//! Rules are checked in order and the first match wins. Typed causes are
//! preferred; message substrings are kept as a fallback for transports that
//! only surface text.

use super::error::{TransferError, TransportError, is_storage_full};
use crate::transfer::TransferState;

type Rule = (fn(&TransferError) -> bool, TransferState);

const RULES: &[Rule] = &[
    (is_disk_full, TransferState::ErrorDiskFull),
    (is_connection_timeout, TransferState::ErrorConnectionTimedOut),
    (is_no_internet, TransferState::ErrorNoInternet),
];

/// Returns the error state a failed download should latch.
#[must_use]
pub fn classify(err: &TransferError) -> TransferState {
    RULES
        .iter()
        .find(|(matches, _)| matches(err))
        .map_or(TransferState::Error, |(_, state)| *state)
}

fn io_source(err: &TransferError) -> Option<&std::io::Error> {
    match err {
        TransferError::Io { source, .. }
        | TransferError::Transport(TransportError::Io { source, .. }) => Some(source),
        _ => None,
    }
}

fn is_disk_full(err: &TransferError) -> bool {
    matches!(err, TransferError::Transport(TransportError::DiskFull { .. }))
        || io_source(err).is_some_and(is_storage_full)
        || err.to_string().contains("No space left on device")
}

fn is_connection_timeout(err: &TransferError) -> bool {
    matches!(
        err,
        TransferError::Transport(TransportError::Timeout { .. } | TransportError::Tls { .. })
    ) || io_source(err).is_some_and(|e| e.kind() == std::io::ErrorKind::TimedOut)
        || err.to_string().contains("Connection timed out")
}

fn is_no_internet(err: &TransferError) -> bool {
    matches!(
        err,
        TransferError::Transport(
            TransportError::UnknownHost { .. } | TransportError::NoNetwork { .. }
        )
    )
}
