//! Reboot Side Channel
//!
//! Before a task holds a driver descriptor it has no way to issue
//! supercalls. It bootstraps through the reboot entry point: a call whose
//! first magic is `KSU_INSTALL_MAGIC1` is intercepted here and never reaches
//! the real reboot path.
//!
//! # Protocol
//! | magic2               | effect                                      |
//! |----------------------|---------------------------------------------|
//! | `KSU_INSTALL_MAGIC2` | install a descriptor when the task resumes  |
//! | `SUSFS_MAGIC`        | run extension command `cmd` (root only)     |
//!
//! Any other combination passes through untouched.

mod extension;
mod install;

use alloc::sync::Arc;

use log::{debug, warn};

use crate::config::{KSU_INSTALL_MAGIC1, KSU_INSTALL_MAGIC2, SUSFS_MAGIC};
use crate::supercall::Supercalls;
use crate::user::UserPtr;

pub use extension::{raw as extension_raw, ExtensionCommand};
pub use install::DriverFile;

/// What the reboot hook should do with the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootVerdict {
    /// Not ours; continue into the real reboot path.
    PassThrough,
    /// Consumed by the side channel.
    Intercepted,
}

impl Supercalls {
    /// Inspect a reboot call.
    ///
    /// Install requests are accepted from any caller: the descriptor only
    /// grants access to the command table, which checks permissions per
    /// request. Scheduling failures leave the caller without a descriptor.
    pub fn handle_reboot(
        self: &Arc<Self>,
        magic1: u32,
        magic2: u32,
        cmd: u32,
        arg: UserPtr,
    ) -> RebootVerdict {
        if magic1 != KSU_INSTALL_MAGIC1 {
            return RebootVerdict::PassThrough;
        }

        if magic2 == KSU_INSTALL_MAGIC2 {
            debug!("install fd requested by pid {}", self.host().current_pid());
            self.schedule_install(arg);
            return RebootVerdict::Intercepted;
        }

        if cfg!(feature = "susfs") && magic2 == SUSFS_MAGIC {
            let host = self.host();
            if host.current_uid() != 0 {
                warn!("susfs: cmd {:#x} rejected for uid {}", cmd, host.current_uid());
                return RebootVerdict::PassThrough;
            }
            match ExtensionCommand::from_raw(cmd) {
                Some(ext) => host.run_extension(ext, arg),
                None => debug!("susfs: unknown cmd {:#x}", cmd),
            }
            return RebootVerdict::Intercepted;
        }

        RebootVerdict::PassThrough
    }
}
