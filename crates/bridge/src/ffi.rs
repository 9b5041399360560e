//! The tagged result returned by every library call.

use dp_chain_core::{DpError, ErrorKind, Result};

/// A failure reported across the library boundary.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FfiError {
    /// Stable error kind.
    pub kind: ErrorKind,
    /// Human-readable detail, passed through verbatim.
    pub message: String,
}

impl From<DpError> for FfiError {
    fn from(err: DpError) -> Self {
        Self {
            kind: err.kind(),
            message: err.message().to_owned(),
        }
    }
}

impl From<FfiError> for DpError {
    fn from(err: FfiError) -> Self {
        DpError::from_kind(err.kind, err.message)
    }
}

/// `Ok(T)` or `Err(kind, message)`; never partially valid.
#[derive(Debug)]
pub enum FfiResult<T> {
    /// The call succeeded.
    Ok(T),
    /// The call failed.
    Err(FfiError),
}

impl<T> FfiResult<T> {
    /// Whether the call succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, FfiResult::Ok(_))
    }

    /// Surface the error unchanged, or return the value.
    pub fn unwrap(self) -> Result<T> {
        self.into_result()
    }

    /// Convert into a native result.
    pub fn into_result(self) -> Result<T> {
        match self {
            FfiResult::Ok(value) => Ok(value),
            FfiResult::Err(err) => Err(err.into()),
        }
    }
}

impl<T> From<Result<T>> for FfiResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => FfiResult::Ok(value),
            Err(err) => FfiResult::Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_survive_the_boundary_unchanged() {
        for kind in ErrorKind::ALL {
            let result: FfiResult<()> = Err(DpError::from_kind(kind, "scale must be finite")).into();
            assert!(!result.is_ok());
            let err = result.unwrap().unwrap_err();
            assert_eq!(err.kind(), kind);
            assert_eq!(err.message(), "scale must be finite");
        }
    }

    #[test]
    fn ok_values_pass_through() {
        let result: FfiResult<i32> = Ok(3).into();
        assert!(result.is_ok());
        assert_eq!(result.unwrap().unwrap(), 3);
    }

    #[test]
    fn error_display_names_the_kind() {
        let err = FfiError::from(DpError::unknown_type("Vec<"));
        assert_eq!(err.to_string(), "UnknownType: Vec<");
    }

    #[test]
    fn boundary_errors_are_std_errors() {
        let err: Box<dyn std::error::Error> =
            Box::new(FfiError::from(DpError::metric_mismatch("no forward map")));
        assert_eq!(err.to_string(), "MetricMismatch: no forward map");
    }
}
