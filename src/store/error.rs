use std::fmt;

use thiserror::Error;

/// One of the two registry keys that can carry the lock screen image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Csp,
    Policy,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csp => f.write_str("PersonalizationCSP key"),
            Self::Policy => f.write_str("Personalization policy key"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    NotFound,
    AccessDenied,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::NotFound, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == BackendErrorKind::NotFound
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => BackendErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => BackendErrorKind::AccessDenied,
            _ => BackendErrorKind::Other,
        };
        Self::new(kind, err.to_string())
    }
}

/// What a single revert step tried to remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertTarget {
    PolicyValue(&'static str),
    CspKey,
}

impl fmt::Display for RevertTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PolicyValue(name) => write!(f, "policy value '{name}'"),
            Self::CspKey => f.write_str("PersonalizationCSP key"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevertFailure {
    pub target: RevertTarget,
    pub error: StoreError,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no image path was supplied")]
    EmptyImagePath,

    #[error("access to the {location} was denied; administrator rights are required")]
    PermissionDenied { location: Location },

    #[error("writing the {location} failed: {cause}")]
    StoreWriteFailed { location: Location, cause: String },

    #[error("{}", describe_failures(.failures))]
    RevertIncomplete { failures: Vec<RevertFailure> },
}

impl StoreError {
    pub fn from_backend(location: Location, err: BackendError) -> Self {
        match err.kind {
            BackendErrorKind::AccessDenied => Self::PermissionDenied { location },
            _ => Self::StoreWriteFailed {
                location,
                cause: err.message,
            },
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::PermissionDenied { .. } => true,
            Self::RevertIncomplete { failures } => {
                failures.iter().any(|f| f.error.is_permission_denied())
            }
            _ => false,
        }
    }
}

fn describe_failures(failures: &[RevertFailure]) -> String {
    let parts: Vec<String> = failures
        .iter()
        .map(|f| format!("{}: {}", f.target, f.error))
        .collect();
    format!("{} deletion(s) failed ({})", failures.len(), parts.join("; "))
}
