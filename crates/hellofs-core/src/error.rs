// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the hello filesystem

use libc::c_int;

/// Per-request failure, converted to exactly one errno reply by the host.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("not found")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("permission denied")]
    PermissionDenied,
    #[error("operation not supported")]
    NotSupported,
    /// The transport delivered a request it promised never to send,
    /// e.g. a read on an inode that was never successfully opened.
    #[error("contract violation: {op} on inode {ino}")]
    ContractViolation { op: &'static str, ino: u64 },
}

impl FsError {
    /// Errno value to hand back to the kernel for this failure.
    pub fn errno(&self) -> c_int {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::NotADirectory => libc::ENOTDIR,
            FsError::IsADirectory => libc::EISDIR,
            FsError::PermissionDenied => libc::EACCES,
            FsError::NotSupported => libc::ENOTSUP,
            FsError::ContractViolation { .. } => libc::EIO,
        }
    }

    pub fn is_contract_violation(&self) -> bool {
        matches!(self, FsError::ContractViolation { .. })
    }
}

pub type FsResult<T> = Result<T, FsError>;
