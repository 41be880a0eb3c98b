//! Error kinds shared across the emulation core.
//!
//! Mirrors the behavioral split the rest of the core relies on: values that
//! reach a user-facing boundary (the [`crate::monitor::Monitor`] prompt, a
//! palette load) are reported and recovered from; [`Error::Internal`]
//! signals a broken invariant and is only ever raised from a context the
//! caller is expected to treat as fatal.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Address outside the `AddressSpace` mask, or outside a device's
    /// declared size after bank translation. Treated as a programmer
    /// error: the clock halts rather than limping on.
    #[error("invalid address: {0:#06x}")]
    InvalidAddress(u16),

    /// A monitor command or register lookup received a malformed value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A numeric literal failed to parse in the selected base.
    #[error("invalid number: {0}")]
    InvalidNumber(String),

    /// A palette, ROM, or save file could not be read or was malformed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An invariant was violated (instruction metadata inconsistent with
    /// its opcode, a device map with holes, etc). Not expected to be
    /// recoverable; callers that see this should halt.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
