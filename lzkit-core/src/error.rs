//! Error types for lzkit operations.
//!
//! Every failure a container session can hit maps onto one [`CodecError`]
//! variant. Callers that only need to branch on the category (the CLI's
//! failure message, tests) use [`CodecError::kind`].

use std::fmt;
use std::io;
use thiserror::Error;

/// The main error type for lzkit operations.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Fewer header bytes were available than the container requires.
    #[error("Invalid header: expected {expected} bytes, found {found}")]
    InvalidHeader {
        /// Bytes required.
        expected: usize,
        /// Bytes actually available.
        found: usize,
    },

    /// The properties byte does not describe a valid lc/lp/pb triple.
    #[error("Not an LZMA container: properties byte {byte:#04x} is out of range")]
    NotAContainer {
        /// The offending properties byte.
        byte: u8,
    },

    /// The scratch allocator refused a request.
    #[error("Out of memory: allocation of {requested} bytes refused")]
    OutOfMemory {
        /// Size of the refused allocation.
        requested: usize,
    },

    /// The encoder failed internally.
    #[error("Encode failure: {message}")]
    EncodeFailure {
        /// Description of the failure.
        message: String,
    },

    /// The decoder rejected the compressed payload.
    #[error("Corrupted data at output offset {offset}: {message}")]
    DecodeFailure {
        /// Number of bytes produced before the error.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// The source ended before the payload was complete.
    #[error("Truncated input: {}", describe_remaining(.remaining))]
    TruncatedInput {
        /// Bytes still declared by the header, if the size is known.
        remaining: Option<u64>,
    },

    /// The payload disagrees with the declared size, or the decoder stalled.
    #[error("Corrupt stream after {produced} bytes: {message}")]
    CorruptStream {
        /// Number of bytes produced before the problem was detected.
        produced: u64,
        /// Description of the problem.
        message: String,
    },

    /// The sink reported an error or accepted fewer bytes than offered.
    #[error("Write failure: {0}")]
    WriteFailure(#[source] io::Error),

    /// The source reported an error other than end of input.
    #[error("Read failure: {0}")]
    ReadFailure(#[source] io::Error),
}

fn describe_remaining(remaining: &Option<u64>) -> String {
    match remaining {
        Some(n) => format!("{n} more bytes were declared"),
        None => "end marker not reached".to_string(),
    }
}

/// Result type alias for lzkit operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Category of a [`CodecError`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`CodecError::InvalidHeader`].
    InvalidHeader,
    /// See [`CodecError::NotAContainer`].
    NotAContainer,
    /// See [`CodecError::OutOfMemory`].
    OutOfMemory,
    /// See [`CodecError::EncodeFailure`].
    EncodeFailure,
    /// See [`CodecError::DecodeFailure`].
    DecodeFailure,
    /// See [`CodecError::TruncatedInput`].
    TruncatedInput,
    /// See [`CodecError::CorruptStream`].
    CorruptStream,
    /// See [`CodecError::WriteFailure`].
    WriteFailure,
    /// See [`CodecError::ReadFailure`].
    ReadFailure,
}

impl ErrorKind {
    /// Short human-readable name of the category.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidHeader => "invalid header",
            Self::NotAContainer => "not an lzma file",
            Self::OutOfMemory => "out of memory",
            Self::EncodeFailure => "encode failure",
            Self::DecodeFailure => "decode failure",
            Self::TruncatedInput => "truncated input",
            Self::CorruptStream => "corrupt stream",
            Self::WriteFailure => "write failure",
            Self::ReadFailure => "read failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CodecError {
    /// Create an invalid header error.
    pub fn invalid_header(expected: usize, found: usize) -> Self {
        Self::InvalidHeader { expected, found }
    }

    /// Create a not-a-container error.
    pub fn not_a_container(byte: u8) -> Self {
        Self::NotAContainer { byte }
    }

    /// Create an out-of-memory error.
    pub fn out_of_memory(requested: usize) -> Self {
        Self::OutOfMemory { requested }
    }

    /// Create an encode failure.
    pub fn encode_failure(message: impl Into<String>) -> Self {
        Self::EncodeFailure {
            message: message.into(),
        }
    }

    /// Create a decode failure.
    pub fn decode_failure(offset: u64, message: impl Into<String>) -> Self {
        Self::DecodeFailure {
            offset,
            message: message.into(),
        }
    }

    /// Create a truncated input error.
    pub fn truncated(remaining: Option<u64>) -> Self {
        Self::TruncatedInput { remaining }
    }

    /// Create a corrupt stream error.
    pub fn corrupt(produced: u64, message: impl Into<String>) -> Self {
        Self::CorruptStream {
            produced,
            message: message.into(),
        }
    }

    /// Create a write failure for a sink that accepted fewer bytes than offered.
    pub fn short_write(offered: usize, accepted: usize) -> Self {
        Self::WriteFailure(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("sink accepted {accepted} of {offered} bytes"),
        ))
    }

    /// The error's category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidHeader { .. } => ErrorKind::InvalidHeader,
            Self::NotAContainer { .. } => ErrorKind::NotAContainer,
            Self::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Self::EncodeFailure { .. } => ErrorKind::EncodeFailure,
            Self::DecodeFailure { .. } => ErrorKind::DecodeFailure,
            Self::TruncatedInput { .. } => ErrorKind::TruncatedInput,
            Self::CorruptStream { .. } => ErrorKind::CorruptStream,
            Self::WriteFailure(_) => ErrorKind::WriteFailure,
            Self::ReadFailure(_) => ErrorKind::ReadFailure,
        }
    }
}
