//! Supercall error taxonomy
//!
//! Every failure that can cross the privilege boundary is one of these
//! variants. The raw ABI carries them as negative errno values.

use thiserror::Error;

/// Linux errno values used on the raw ABI.
pub mod errno {
    pub const EPERM: i32 = 1;
    pub const ENOENT: i32 = 2;
    pub const ENOMEM: i32 = 12;
    pub const EFAULT: i32 = 14;
    pub const EEXIST: i32 = 17;
    pub const EINVAL: i32 = 22;
    pub const ENOTTY: i32 = 25;
}

/// Result alias used by handlers and host seams.
pub type Result<T, E = SupercallError> = core::result::Result<T, E>;

/// Error returned by a supercall or one of its collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SupercallError {
    /// Opcode is not present in the command table.
    #[error("unsupported command")]
    UnsupportedCommand,
    /// Permission predicate rejected the caller.
    #[error("permission denied")]
    PermissionDenied,
    /// Malformed, oversized or out-of-range input.
    #[error("bad argument")]
    BadArgument,
    /// Copy across the user boundary failed.
    #[error("fault copying across the user boundary")]
    CopyFault,
    /// Registry already holds an entry for this key.
    #[error("entry already present")]
    DuplicateEntry,
    /// No free descriptor slot or allocation failure.
    #[error("resource exhausted")]
    ResourceExhausted,
    /// External store has no state for the query.
    #[error("not found")]
    NotFound,
    /// Failure code reported by an external collaborator, passed through.
    #[error("collaborator failed with errno {0}")]
    Errno(i32),
}

impl SupercallError {
    /// Negative errno as seen by user space.
    pub const fn errno(self) -> i32 {
        match self {
            Self::UnsupportedCommand => -errno::ENOTTY,
            Self::PermissionDenied => -errno::EPERM,
            Self::BadArgument => -errno::EINVAL,
            Self::CopyFault => -errno::EFAULT,
            Self::DuplicateEntry => -errno::EEXIST,
            Self::ResourceExhausted => -errno::ENOMEM,
            Self::NotFound => -errno::ENOENT,
            Self::Errno(code) => code,
        }
    }

    /// Map a negative errno back to a variant.
    ///
    /// Codes without a dedicated variant are preserved in `Errno`.
    pub const fn from_errno(code: i32) -> Self {
        match -code {
            errno::ENOTTY => Self::UnsupportedCommand,
            errno::EPERM => Self::PermissionDenied,
            errno::EINVAL => Self::BadArgument,
            errno::EFAULT => Self::CopyFault,
            errno::EEXIST => Self::DuplicateEntry,
            errno::ENOMEM => Self::ResourceExhausted,
            errno::ENOENT => Self::NotFound,
            _ => Self::Errno(code),
        }
    }
}

/// Flatten a handler result into the raw ABI return value.
pub fn into_raw(result: Result<i32>) -> i64 {
    match result {
        Ok(value) => value as i64,
        Err(e) => e.errno() as i64,
    }
}
