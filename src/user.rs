//! User Memory Access
//!
//! Every request argument lives in caller-controlled memory. Handlers never
//! operate on it in place: they copy it into a kernel-owned value, work on
//! the copy, and copy results back only on success.
//!
//! # Security Principles
//! - Null pointers are rejected before the host is consulted
//! - Copies are all-or-nothing; a short copy is a fault
//! - Strings are bounded and always NUL-terminated kernel-side

use alloc::vec::Vec;

use crate::config::PATH_BUF_LEN;
use crate::error::{Result, SupercallError};
use crate::host::UserAccess;
use crate::uapi::Plain;

/// An untrusted address in the caller's address space.
///
/// This is a newtype so that user addresses are never dereferenced directly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[repr(transparent)]
pub struct UserPtr(u64);

impl UserPtr {
    pub const NULL: Self = Self(0);

    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    #[inline]
    pub const fn addr(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Copy a request structure in from user space.
pub fn copy_from_user<T: Plain, M: UserAccess + ?Sized>(mem: &M, src: UserPtr) -> Result<T> {
    if src.is_null() {
        return Err(SupercallError::CopyFault);
    }
    let mut value = T::zeroed();
    mem.read_user(src, value.as_bytes_mut())
        .map_err(|_| SupercallError::CopyFault)?;
    Ok(value)
}

/// Copy a reply structure out to user space.
pub fn copy_to_user<T: Plain, M: UserAccess + ?Sized>(
    mem: &M,
    dst: UserPtr,
    value: &T,
) -> Result<()> {
    if dst.is_null() {
        return Err(SupercallError::CopyFault);
    }
    mem.write_user(dst, value.as_bytes())
        .map_err(|_| SupercallError::CopyFault)
}

/// Copy a path string from user space.
///
/// Accepts at most `PATH_BUF_LEN - 1` bytes. Returns the bytes before the
/// terminating NUL.
///
/// # Errors
/// * `CopyFault` - the string could not be read
/// * `BadArgument` - no NUL within the bound
pub fn read_path<M: UserAccess + ?Sized>(mem: &M, src: UserPtr) -> Result<Vec<u8>> {
    if src.is_null() {
        return Err(SupercallError::CopyFault);
    }
    let mut buf = [0u8; PATH_BUF_LEN];
    let len = mem
        .read_user_str(src, &mut buf)
        .map_err(|_| SupercallError::CopyFault)?;
    if len >= buf.len() {
        return Err(SupercallError::BadArgument);
    }
    Ok(buf[..len].to_vec())
}
