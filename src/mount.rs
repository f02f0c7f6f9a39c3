//! Try-Umount Registry
//!
//! Paths the host should try to unmount for processes that must not see
//! module overlays. The registry is a deduplicated list of path + flag
//! entries guarded by a single reader/writer lock.
//!
//! # Invariants
//! - At most one entry per distinct path string
//! - Every access, reads included, holds the write lock for its full duration
//! - Entries are built and validated before the lock is taken, so a
//!   failed add never leaves partial state behind

use alloc::vec::Vec;

use bitflags::bitflags;
use log::info;
use spin::RwLock;

use crate::config::PATH_BUF_LEN;
use crate::error::{Result, SupercallError};
use crate::uapi::umount_mode;

bitflags! {
    /// Flags handed to `umount2` when the entry is unmounted.
    ///
    /// Unknown bits are retained so newer callers are not silently truncated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct UmountFlags: u32 {
        const FORCE = 0x1;
        const DETACH = 0x2;
        const EXPIRE = 0x4;
        const NOFOLLOW = 0x8;
    }
}

/// One registered path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    path: Vec<u8>,
    flags: UmountFlags,
}

impl MountEntry {
    /// Validate and build an entry.
    ///
    /// The path must be non-empty, fit the kernel path buffer with its NUL,
    /// and contain no interior NUL.
    pub fn new(path: &[u8], flags: UmountFlags) -> Result<Self> {
        if path.is_empty() || path.len() >= PATH_BUF_LEN || path.contains(&0) {
            return Err(SupercallError::BadArgument);
        }
        Ok(Self {
            path: path.to_vec(),
            flags,
        })
    }

    #[inline]
    pub fn path(&self) -> &[u8] {
        &self.path
    }

    #[inline]
    pub fn flags(&self) -> UmountFlags {
        self.flags
    }
}

/// Sub-operation selected by the mode field of ADD_TRY_UMOUNT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UmountMode {
    Wipe,
    Add,
    Delete,
}

impl TryFrom<u8> for UmountMode {
    type Error = SupercallError;

    fn try_from(mode: u8) -> Result<Self> {
        match mode {
            umount_mode::WIPE => Ok(Self::Wipe),
            umount_mode::ADD => Ok(Self::Add),
            umount_mode::DEL => Ok(Self::Delete),
            _ => Err(SupercallError::BadArgument),
        }
    }
}

/// Render a path for logging.
pub(crate) fn display_path(path: &[u8]) -> &str {
    core::str::from_utf8(path).unwrap_or("<non-utf8>")
}

/// Deduplicated, lock-guarded list of try-umount entries.
#[derive(Debug, Default)]
pub struct MountRegistry {
    entries: RwLock<Vec<MountEntry>>,
}

impl MountRegistry {
    pub const fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Append a new entry.
    ///
    /// # Errors
    /// * `BadArgument` - path is empty, too long, or contains a NUL
    /// * `DuplicateEntry` - an entry with the same path already exists
    pub fn add(&self, path: &[u8], flags: UmountFlags) -> Result<()> {
        let entry = MountEntry::new(path, flags)?;

        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.path == entry.path) {
            info!("try_umount: {} is already here!", display_path(path));
            return Err(SupercallError::DuplicateEntry);
        }
        entries.push(entry);
        drop(entries);

        info!("try_umount: {} added (flags {:#x})", display_path(path), flags.bits());
        Ok(())
    }

    /// Remove every entry whose path equals `path`. Returns how many were removed.
    pub fn remove(&self, path: &[u8]) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| {
            let hit = e.path == path;
            if hit {
                info!("try_umount: entry removed: {}", display_path(&e.path));
            }
            !hit
        });
        before - entries.len()
    }

    /// Remove all entries. Returns how many were removed.
    pub fn wipe(&self) -> usize {
        let mut entries = self.entries.write();
        for e in entries.iter() {
            info!("try_umount: wiping entry: {}", display_path(&e.path));
        }
        let removed = entries.len();
        entries.clear();
        removed
    }

    /// Copy of the current entries, in insertion order.
    ///
    /// Used by the unmount pass.
    pub fn snapshot(&self) -> Vec<MountEntry> {
        self.entries.write().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.write().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flags registered for `path`, if any.
    pub fn flags_of(&self, path: &[u8]) -> Option<UmountFlags> {
        self.entries
            .write()
            .iter()
            .find(|e| e.path == path)
            .map(|e| e.flags)
    }
}
