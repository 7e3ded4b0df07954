//! Error type and Return values used by the encoder.

use thiserror::Error;

/// Represents all possible errors that can happen while encoding or parsing
/// abi values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// `bytesN` only exists for `1 <= N <= 32`.
    #[error("fixed bytes must be between 1 and 32 bytes long, got {0}")]
    InvalidFixedBytesLength(usize),
    /// A hex string did not decode into the expected number of bytes.
    #[error("expected {0} hex encoded bytes")]
    InvalidHex(usize),
    /// A value did not have the shape a decoder expected, for example a free
    /// balance state missing its token list.
    #[error("unexpected abi value shape: {0}")]
    UnexpectedShape(&'static str),
}

/// Alias for `Result` using the [Error] returned by the encoder.
pub type Result<T> = core::result::Result<T, Error>;
