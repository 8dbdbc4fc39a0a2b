use rover_types::ObjectRef;
use thiserror::Error;

/// Errors surfaced by namespace nodes.
#[derive(Debug, Error)]
pub enum FsError {
    /// Lookup target absent from a populated directory.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any mutation attempt. Unconditional and never retried.
    #[error("permission denied")]
    PermissionDenied,

    /// A collaborator call failed.
    #[error("I/O failure: {0}")]
    Io(String),

    /// The graph has a shape this layer cannot present safely.
    #[error("malformed graph at {at}: {reason}")]
    Malformed { at: ObjectRef, reason: String },

    /// No extended attribute with this name.
    #[error("no such attribute: {0}")]
    NoAttribute(String),

    #[error("not a directory")]
    NotADirectory,

    #[error("is a directory")]
    IsADirectory,

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("mount failed: {0}")]
    Mount(String),
}

impl FsError {
    /// The errno reported to the kernel for this error.
    pub fn errno(&self) -> libc::c_int {
        match self {
            Self::NotFound(_) => libc::ENOENT,
            Self::PermissionDenied => libc::EPERM,
            Self::Io(_) | Self::Malformed { .. } => libc::EIO,
            Self::NoAttribute(_) => libc::ENODATA,
            Self::NotADirectory => libc::ENOTDIR,
            Self::IsADirectory => libc::EISDIR,
            Self::InvalidOperation(_) | Self::Config(_) => libc::EINVAL,
            Self::Mount(_) => libc::EIO,
        }
    }
}

/// Result alias for namespace operations.
pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping() {
        assert_eq!(FsError::NotFound("x".into()).errno(), libc::ENOENT);
        assert_eq!(FsError::PermissionDenied.errno(), libc::EPERM);
        assert_eq!(FsError::Io("boom".into()).errno(), libc::EIO);
        assert_eq!(
            FsError::Malformed {
                at: ObjectRef::from_bytes(b"x"),
                reason: "bad".into(),
            }
            .errno(),
            libc::EIO
        );
        assert_eq!(FsError::NoAttribute("user.x".into()).errno(), libc::ENODATA);
        assert_eq!(FsError::NotADirectory.errno(), libc::ENOTDIR);
    }
}
