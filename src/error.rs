use core::fmt;
use core::mem::discriminant;

use embedded_error::mci::{CommandOrDataError, MciError};
use embedded_error::ImplError;

/// Protocol-layer failure.
///
/// Transport failures pass through unchanged as [`Error::Host`]; every other
/// variant is a condition this layer detected itself, before or after the
/// transport ran.
pub enum Error {
    /// The host executor reported a failure; carried verbatim.
    Host(MciError),
    /// A retry budget or bounded wait ran out.
    Timeout,
    /// A response decoded to something the protocol forbids.
    InvalidResponse,
    /// The card lacks a capability this operation requires.
    NotSupported,
    /// A caller-supplied buffer breaks an alignment, placement or length
    /// rule. Raised before anything reaches the transport.
    InvalidArgument,
    /// A sector range reaches beyond the card capacity.
    InvalidSize,
    /// No memory for a staging buffer.
    NoMemory,
}

impl Error {
    /// Whether this failure is a timeout, either detected here or reported
    /// by the host executor. Card-family fallback keys on this: a card of
    /// the other family never answers the first negotiation at all.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout => true,
            Error::Host(MciError::CommandError(CommandOrDataError::Timeout)) => true,
            Error::Host(MciError::DataError(CommandOrDataError::Timeout)) => true,
            Error::Host(MciError::Impl(ImplError::TimedOut)) => true,
            _ => false,
        }
    }
}

impl From<MciError> for Error {
    fn from(err: MciError) -> Self {
        Error::Host(err)
    }
}

// The executor error enums come without trait impls of their own, so the
// surface here is written out by hand and stops at their variant kind.

fn host_error_kind(err: &MciError) -> &'static str {
    match err {
        MciError::CommandError(_) => "CommandError",
        MciError::DataError(_) => "DataError",
        MciError::Impl(_) => "Impl",
        _ => "Other",
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Host(err) => write!(f, "Host({})", host_error_kind(err)),
            Error::Timeout => f.write_str("Timeout"),
            Error::InvalidResponse => f.write_str("InvalidResponse"),
            Error::NotSupported => f.write_str("NotSupported"),
            Error::InvalidArgument => f.write_str("InvalidArgument"),
            Error::InvalidSize => f.write_str("InvalidSize"),
            Error::NoMemory => f.write_str("NoMemory"),
        }
    }
}

/// Equality by failure kind. Two host failures are equal when the executor
/// reported the same variant; the command, data and impl variants also
/// compare their inner error code, which is all the detail they carry.
impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        match (self, other) {
            (Error::Host(a), Error::Host(b)) => host_error_eq(a, b),
            _ => discriminant(self) == discriminant(other),
        }
    }
}

fn host_error_eq(a: &MciError, b: &MciError) -> bool {
    match (a, b) {
        (MciError::CommandError(a), MciError::CommandError(b)) => {
            discriminant(a) == discriminant(b)
        }
        (MciError::DataError(a), MciError::DataError(b)) => discriminant(a) == discriminant(b),
        (MciError::Impl(a), MciError::Impl(b)) => discriminant(a) == discriminant(b),
        _ => discriminant(a) == discriminant(b),
    }
}
