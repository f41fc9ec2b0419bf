//! Error types for the codec.
//!
//! Every failure surfaces as a single [`Error`] enum. Callers that need to
//! branch on the failure class use [`Error::kind`], which sees through the
//! path annotations that the encoder and decoder attach while unwinding
//! (`Transfer: memo: ...`).
//!
//! Errors are `Clone` so that a failed engine can replay its stored error on
//! every subsequent operation; the wrapped I/O error is reference-counted for
//! that reason.

use std::sync::Arc;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The failure classes callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input bytes do not form a valid encoding: truncated input,
    /// invalid boolean or presence byte, unknown variant index, duplicate
    /// map key, or an overlong varint.
    MalformedInput,
    /// The value shape cannot be encoded or decoded: an unregistered trait
    /// object, or a struct-enum with zero or several active variants.
    UnsupportedType,
    /// A numeric value does not fit its declared wire width, or a collection
    /// length exceeds its configured ceiling.
    OutOfRange,
    /// An absent value in a position that does not admit absence.
    NullViolation,
    /// A bad field tag, an invalid option combination, or a misuse of the
    /// registration API.
    Configuration,
    /// The byte sink or source failed, including end of input.
    Io,
}

/// Errors produced by encoding, decoding, and registration.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Invalid wire data.
    #[error("malformed input: {0}")]
    Malformed(String),

    /// Value shape not supported by the codec.
    #[error("unsupported type: {0}")]
    Unsupported(String),

    /// Value does not fit the declared width or limit.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// Null in a non-optional position.
    #[error("null value: {0}")]
    Null(String),

    /// Bad tag, option combination, or registration.
    #[error("configuration: {0}")]
    Config(String),

    /// Sink or source failure, including end of input.
    #[error("i/o: {0}")]
    Io(#[source] Arc<std::io::Error>),

    /// A lower-level error annotated with the field or index it occurred at.
    #[error("{path}: {source}")]
    Context {
        /// Field name, `[index]`, `key`, or `value` segment.
        path: String,
        /// The underlying error.
        source: Box<Error>,
    },
}

impl Error {
    /// Creates a malformed-input error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// Creates an unsupported-type error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Creates an out-of-range error.
    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::OutOfRange(msg.into())
    }

    /// Creates a null-violation error.
    pub fn null(msg: impl Into<String>) -> Self {
        Self::Null(msg.into())
    }

    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Annotates this error with the field or index path segment it
    /// bubbled out of. Segments accumulate outside-in, so the final
    /// message reads root-first: `Transfer: amounts: [3]: out of range`.
    #[must_use]
    pub fn context(self, segment: impl Into<String>) -> Self {
        Self::Context { path: segment.into(), source: Box::new(self) }
    }

    /// The failure class, looking through any path annotations.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed(_) => ErrorKind::MalformedInput,
            Self::Unsupported(_) => ErrorKind::UnsupportedType,
            Self::OutOfRange(_) => ErrorKind::OutOfRange,
            Self::Null(_) => ErrorKind::NullViolation,
            Self::Config(_) => ErrorKind::Configuration,
            Self::Io(_) => ErrorKind::Io,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// Whether this error was caused by the source running out of bytes.
    ///
    /// Hostile length prefixes are required to surface as end-of-input, so
    /// callers (and tests) need to distinguish this from other I/O failures.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        match self {
            Self::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            Self::Context { source, .. } => source.is_eof(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_sees_through_context() {
        let err = Error::out_of_range("value 300 does not fit in 1 byte")
            .context("[3]")
            .context("amounts")
            .context("Transfer");
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        assert_eq!(err.to_string(), "Transfer: amounts: [3]: out of range: value 300 does not fit in 1 byte");
    }

    #[test]
    fn eof_detection() {
        let eof = Error::from(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"));
        assert!(eof.is_eof());
        assert!(eof.clone().context("field").is_eof());
        assert_eq!(eof.kind(), ErrorKind::Io);

        let other = Error::from(std::io::Error::other("broken pipe"));
        assert!(!other.is_eof());
        assert!(!Error::malformed("junk").is_eof());
    }
}
