#![forbid(unsafe_code)]

use core::{convert::Infallible, fmt};

use buggy::Bug;

use crate::{algorithm::AlgorithmName, key::KeyType, policy::Operation, usage::KeyUsage};

/// Encompasses the different errors directly returned by this
/// crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A field of an [`Algorithm`][crate::Algorithm] was
    /// malformed, missing, or unsupported.
    ///
    /// It describes why the argument is invalid.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    /// A usage is not permitted for the operation: either the
    /// key lacks the usage the operation needs, or the usage was
    /// requested for a key that cannot have it.
    #[error("`{usage}` usage not permitted for `{operation}`")]
    UsageNotPermitted {
        /// The rejected operation.
        operation: Operation,
        /// The offending usage.
        usage: KeyUsage,
    },
    /// The key's type cannot be used for the operation.
    #[error("`{operation}` cannot be performed with a {got} key")]
    WrongKeyType {
        /// The rejected operation.
        operation: Operation,
        /// The key's actual type.
        got: KeyType,
    },
    /// The key was created for a different algorithm family.
    #[error("key algorithm mismatch: expected {expected}, got {got}")]
    KeyAlgorithmMismatch {
        /// The family named by the algorithm descriptor.
        expected: AlgorithmName,
        /// The family the key was created for.
        got: AlgorithmName,
    },
    /// Export was attempted on a non-extractable key.
    ///
    /// Contains the backend's rejection if the backend was the
    /// one to refuse.
    #[error("key is not extractable")]
    NotExtractable(#[source] Option<BackendError>),
    /// The operation is recognized but not wired up to a backend
    /// primitive.
    #[error("unimplemented: {0}")]
    Unimplemented(&'static str),
    /// The backend rejected or failed the operation.
    #[error(transparent)]
    Backend(BackendError),
    /// An internal bug was discovered.
    #[error(transparent)]
    InvariantViolation(#[from] Bug),
}

impl Error {
    /// Identifies the type of error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter(_) => ErrorKind::InvalidParameter,
            Self::UsageNotPermitted { .. } => ErrorKind::UsageNotPermitted,
            Self::WrongKeyType { .. } => ErrorKind::WrongKeyType,
            Self::KeyAlgorithmMismatch { .. } => ErrorKind::KeyAlgorithmMismatch,
            Self::NotExtractable(_) => ErrorKind::NotExtractable,
            Self::Unimplemented(_) => ErrorKind::Unimplemented,
            Self::Backend(_) => ErrorKind::Backend,
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
        }
    }

    /// Reports whether the error was raised before the backend
    /// was invoked.
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameter(_)
                | Self::UsageNotPermitted { .. }
                | Self::WrongKeyType { .. }
                | Self::KeyAlgorithmMismatch { .. }
                | Self::NotExtractable(None)
        )
    }

    /// Reports whether the error is a bug in this crate.
    ///
    /// These must never be retried.
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        // The backend is authoritative about extractability.
        if err.kind() == BackendErrorKind::NotExtractable {
            Self::NotExtractable(Some(err))
        } else {
            Self::Backend(err)
        }
    }
}

impl From<Infallible> for Error {
    fn from(err: Infallible) -> Self {
        match err {}
    }
}

/// Categories of [`Error`]s.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum ErrorKind {
    /// See [`Error::InvalidParameter`].
    InvalidParameter,
    /// See [`Error::UsageNotPermitted`].
    UsageNotPermitted,
    /// See [`Error::WrongKeyType`].
    WrongKeyType,
    /// See [`Error::KeyAlgorithmMismatch`].
    KeyAlgorithmMismatch,
    /// See [`Error::NotExtractable`].
    NotExtractable,
    /// See [`Error::Unimplemented`].
    Unimplemented,
    /// See [`Error::Backend`].
    Backend,
    /// See [`Error::InvariantViolation`].
    InvariantViolation,
}

/// An error returned by a [`Backend`][crate::Backend].
///
/// The backend's own error is kept verbatim as the
/// [`source`][core::error::Error::source].
#[derive(Debug, thiserror::Error)]
#[error("backend error ({kind}): {err}")]
pub struct BackendError {
    kind: BackendErrorKind,
    #[source]
    err: Box<dyn core::error::Error + Send + Sync + 'static>,
}

impl BackendError {
    /// Creates a new [`BackendError`].
    pub fn new<E>(kind: BackendErrorKind, err: E) -> Self
    where
        E: Into<Box<dyn core::error::Error + Send + Sync + 'static>>,
    {
        Self {
            kind,
            err: err.into(),
        }
    }

    /// Shorthand for [`new`][Self::new] with a static message.
    pub fn msg(kind: BackendErrorKind, msg: &'static str) -> Self {
        Self::new(kind, msg)
    }

    /// Shorthand for [`new`][Self::new] with
    /// [`BackendErrorKind::Other`].
    pub fn other<E>(err: E) -> Self
    where
        E: Into<Box<dyn core::error::Error + Send + Sync + 'static>>,
    {
        Self::new(BackendErrorKind::Other, err)
    }

    /// Identifies the type of error.
    #[inline]
    pub const fn kind(&self) -> BackendErrorKind {
        self.kind
    }

    /// Attempts to downcast the error into `T`.
    #[inline]
    pub fn downcast_ref<T: core::error::Error + 'static>(&self) -> Option<&T> {
        self.err.downcast_ref::<T>()
    }

    /// Returns the backend's original error.
    pub fn into_inner(self) -> Box<dyn core::error::Error + Send + Sync + 'static> {
        self.err
    }
}

/// Categories of [`BackendError`]s.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum BackendErrorKind {
    /// The cryptographic operation itself failed.
    Operation,
    /// The backend does not support the algorithm, format, or
    /// parameter set.
    NotSupported,
    /// The backend refused to export a key.
    NotExtractable,
    /// The backend dropped the operation without completing it.
    Abandoned,
    /// Any other error.
    Other,
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Operation => "operation failed",
            Self::NotSupported => "not supported",
            Self::NotExtractable => "not extractable",
            Self::Abandoned => "abandoned",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}
