//! Error types for building, composing and calibrating privacy pipelines.

use std::fmt;

/// Stable discriminant of a [`DpError`].
///
/// The names returned by [`ErrorKind::as_str`] are part of the library
/// boundary and do not change between releases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A type name failed to parse.
    UnknownType,
    /// Type inference had no usable example.
    AmbiguousType,
    /// A value does not match its declared descriptor.
    TypeMismatch,
    /// Two domains (or a bound and its metric) are not compatible.
    DomainMismatch,
    /// Two metrics or measures are not compatible.
    MetricMismatch,
    /// Calibration could not bracket a solution.
    SearchBoundsExhausted,
    /// An operation rejected its parameters or failed internally.
    NativeOperationFailed,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::UnknownType,
        ErrorKind::AmbiguousType,
        ErrorKind::TypeMismatch,
        ErrorKind::DomainMismatch,
        ErrorKind::MetricMismatch,
        ErrorKind::SearchBoundsExhausted,
        ErrorKind::NativeOperationFailed,
    ];

    /// Stable name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownType => "UnknownType",
            ErrorKind::AmbiguousType => "AmbiguousType",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::DomainMismatch => "DomainMismatch",
            ErrorKind::MetricMismatch => "MetricMismatch",
            ErrorKind::SearchBoundsExhausted => "SearchBoundsExhausted",
            ErrorKind::NativeOperationFailed => "NativeOperationFailed",
        }
    }

    /// Look a kind up by its stable name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while building or querying pipelines.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum DpError {
    /// A type name failed to parse.
    #[error("unknown type: {msg}")]
    UnknownType {
        /// Human-readable error description.
        msg: String,
    },

    /// Type inference had no usable example.
    #[error("ambiguous type: {msg}")]
    AmbiguousType {
        /// Human-readable error description.
        msg: String,
    },

    /// A value's shape does not match its declared or expected descriptor.
    #[error("type mismatch: {msg}")]
    TypeMismatch {
        /// Human-readable error description.
        msg: String,
    },

    /// Domains are not composable, or a bound is outside its metric's domain.
    #[error("domain mismatch: {msg}")]
    DomainMismatch {
        /// Human-readable error description.
        msg: String,
    },

    /// Metrics or measures are not composable.
    #[error("metric mismatch: {msg}")]
    MetricMismatch {
        /// Human-readable error description.
        msg: String,
    },

    /// Calibration could not bracket a parameter satisfying the target.
    #[error("search bounds exhausted: {msg}")]
    SearchBoundsExhausted {
        /// Human-readable error description.
        msg: String,
    },

    /// The underlying operation rejected its parameters or hit a fault.
    #[error("native operation failed: {msg}")]
    NativeOperationFailed {
        /// Message reported by the operation, verbatim.
        msg: String,
    },
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, DpError>;

impl DpError {
    /// Rebuild an error from its kind and message.
    pub fn from_kind<S: Into<String>>(kind: ErrorKind, msg: S) -> Self {
        let msg = msg.into();
        match kind {
            ErrorKind::UnknownType => Self::UnknownType { msg },
            ErrorKind::AmbiguousType => Self::AmbiguousType { msg },
            ErrorKind::TypeMismatch => Self::TypeMismatch { msg },
            ErrorKind::DomainMismatch => Self::DomainMismatch { msg },
            ErrorKind::MetricMismatch => Self::MetricMismatch { msg },
            ErrorKind::SearchBoundsExhausted => Self::SearchBoundsExhausted { msg },
            ErrorKind::NativeOperationFailed => Self::NativeOperationFailed { msg },
        }
    }

    /// Create an unknown type error.
    pub fn unknown_type<S: Into<String>>(msg: S) -> Self {
        Self::UnknownType { msg: msg.into() }
    }

    /// Create an ambiguous type error.
    pub fn ambiguous_type<S: Into<String>>(msg: S) -> Self {
        Self::AmbiguousType { msg: msg.into() }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch<S: Into<String>>(msg: S) -> Self {
        Self::TypeMismatch { msg: msg.into() }
    }

    /// Create a domain mismatch error.
    pub fn domain_mismatch<S: Into<String>>(msg: S) -> Self {
        Self::DomainMismatch { msg: msg.into() }
    }

    /// Create a metric mismatch error.
    pub fn metric_mismatch<S: Into<String>>(msg: S) -> Self {
        Self::MetricMismatch { msg: msg.into() }
    }

    /// Create a search bounds exhausted error.
    pub fn search_exhausted<S: Into<String>>(msg: S) -> Self {
        Self::SearchBoundsExhausted { msg: msg.into() }
    }

    /// Create a native operation error.
    pub fn native<S: Into<String>>(msg: S) -> Self {
        Self::NativeOperationFailed { msg: msg.into() }
    }

    /// The stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownType { .. } => ErrorKind::UnknownType,
            Self::AmbiguousType { .. } => ErrorKind::AmbiguousType,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::DomainMismatch { .. } => ErrorKind::DomainMismatch,
            Self::MetricMismatch { .. } => ErrorKind::MetricMismatch,
            Self::SearchBoundsExhausted { .. } => ErrorKind::SearchBoundsExhausted,
            Self::NativeOperationFailed { .. } => ErrorKind::NativeOperationFailed,
        }
    }

    /// The message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::UnknownType { msg }
            | Self::AmbiguousType { msg }
            | Self::TypeMismatch { msg }
            | Self::DomainMismatch { msg }
            | Self::MetricMismatch { msg }
            | Self::SearchBoundsExhausted { msg }
            | Self::NativeOperationFailed { msg } => msg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(ErrorKind::from_name("Nope"), None);
    }

    #[test]
    fn from_kind_preserves_message() {
        let err = DpError::from_kind(ErrorKind::TypeMismatch, "expected i32");
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(err.message(), "expected i32");
        assert_eq!(err.to_string(), "type mismatch: expected i32");
    }
}
