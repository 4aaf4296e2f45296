//! Error taxonomy for the dispatcher.
//!
//! Every failure a request can hit is a [`GateError`]. Each variant has a
//! stable [`ErrorKind`] whose label is what the audit log records as the
//! outcome, so the trail and the returned result always agree.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::role::{Operation, Role};

/// Errors produced by RoleGate, PathGuard and FsOps.
#[derive(Debug, Error)]
pub enum GateError {
    /// The role is not allowed to run the operation, or the operation is unknown.
    #[error("{role} is not allowed to run {operation}")]
    Unauthorized { role: Role, operation: String },

    /// The raw path was rejected before touching the filesystem.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// The path resolves outside every namespace root of the role.
    #[error("path escapes namespace: {}", path.display())]
    PathEscape { path: PathBuf },

    #[error("{}: no such file or directory", path.display())]
    NotFound { path: PathBuf },

    #[error("{}: already exists", path.display())]
    PathExists { path: PathBuf },

    #[error("{}: not a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("{}: permission denied", path.display())]
    PermissionDenied { path: PathBuf },

    /// Wrong arity, bad mode, oversized content, bad glob.
    #[error("invalid argument for {operation}: {reason}")]
    InvalidArgument { operation: Operation, reason: String },

    /// Any other OS failure, with the underlying message.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Stable classification of a [`GateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthorized,
    InvalidPath,
    PathEscape,
    NotFound,
    PathExists,
    NotADirectory,
    PermissionDenied,
    InvalidArgument,
    IoError,
}

impl ErrorKind {
    /// Snake-case label used in audit records.
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidPath => "invalid_path",
            ErrorKind::PathEscape => "path_escape",
            ErrorKind::NotFound => "not_found",
            ErrorKind::PathExists => "path_exists",
            ErrorKind::NotADirectory => "not_a_directory",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::IoError => "io_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl GateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GateError::Unauthorized { .. } => ErrorKind::Unauthorized,
            GateError::InvalidPath { .. } => ErrorKind::InvalidPath,
            GateError::PathEscape { .. } => ErrorKind::PathEscape,
            GateError::NotFound { .. } => ErrorKind::NotFound,
            GateError::PathExists { .. } => ErrorKind::PathExists,
            GateError::NotADirectory { .. } => ErrorKind::NotADirectory,
            GateError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            GateError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            GateError::Io { .. } => ErrorKind::IoError,
        }
    }

    pub(crate) fn invalid_path(path: impl Into<String>, reason: &'static str) -> Self {
        GateError::InvalidPath {
            path: path.into(),
            reason,
        }
    }

    pub(crate) fn invalid_argument(operation: Operation, reason: impl Into<String>) -> Self {
        GateError::InvalidArgument {
            operation,
            reason: reason.into(),
        }
    }

    /// Classify an OS error raised while operating on `path`.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        let path = path.to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => GateError::NotFound { path },
            io::ErrorKind::AlreadyExists => GateError::PathExists { path },
            io::ErrorKind::NotADirectory => GateError::NotADirectory { path },
            io::ErrorKind::PermissionDenied => GateError::PermissionDenied { path },
            _ => GateError::Io { path, source: err },
        }
    }
}

/// Extension for attaching the offending path to an `io::Result`.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T, GateError>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: &Path) -> Result<T, GateError> {
        self.map_err(|e| GateError::from_io(path, e))
    }
}

/// Failure to append to the audit log.
///
/// Never fatal: it is reported next to the operation's own result.
#[derive(Debug, Error)]
#[error("audit write to {} failed: {source}", path.display())]
pub struct AuditError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

pub type GateResult<T> = Result<T, GateError>;
