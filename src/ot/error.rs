use thiserror::Error;

use super::operation::OperationKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OtError {
    #[error("Malformed operation: {0}")]
    MalformedOperation(String),

    #[error("Unsupported operation kind: {0:?}")]
    UnsupportedOperationKind(OperationKind),

    #[error("Operation kind mismatch: {left:?} paired with {right:?}")]
    OperationKindMismatch {
        left: OperationKind,
        right: OperationKind,
    },

    #[error("Stream length mismatch: {0}")]
    StreamLengthMismatch(String),

    #[error("Conflicting permission for user {user}: bits {bits:#x}")]
    ConflictingPermission { user: String, bits: u64 },

    #[error("Permission bits already granted: {0:#x}")]
    AlreadyGranted(u64),

    #[error("Permission bits already revoked: {0:#x}")]
    AlreadyRevoked(u64),

    /// Not a failure: the blob is queued until its dependency is applied
    #[error("Dependency unsatisfied: {0}")]
    DependencyUnsatisfied(String),

    #[error("Unknown document: {0}")]
    UnknownDocument(String),
}

impl OtError {
    pub(crate) fn mismatch(left: OperationKind, right: OperationKind) -> Self {
        OtError::OperationKindMismatch { left, right }
    }
}
