//! Supercall Dispatcher
//!
//! Routes a request from the manager to one entry of the command table.
//!
//! # Request Path
//! 1. Look up the opcode; unknown opcodes fail with `UnsupportedCommand`
//! 2. Snapshot the caller and evaluate the entry's predicate; a rejected
//!    caller gets `PermissionDenied` and the handler never runs
//! 3. Run the handler and return its result unchanged
//!
//! Every terminal outcome after lookup emits exactly one audit record.
//! Audit is best-effort and never alters the returned result.

mod handlers;
pub mod permission;
pub mod table;

use alloc::sync::Arc;

use log::{debug, info, warn};

use crate::config::Config;
use crate::error::{into_raw, Result, SupercallError};
use crate::host::{AuditOutcome, Host};
use crate::lifecycle::LifecycleLatches;
use crate::mount::MountRegistry;
use crate::user::UserPtr;

pub use permission::{Caller, Permission};
pub use table::{lookup, Command, COMMANDS};

/// Control-plane state shared by every request.
pub struct Supercalls {
    host: Arc<dyn Host>,
    config: Config,
    mounts: MountRegistry,
    latches: LifecycleLatches,
}

impl Supercalls {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self::with_config(host, Config::default())
    }

    pub fn with_config(host: Arc<dyn Host>, config: Config) -> Self {
        Self {
            host,
            config,
            mounts: MountRegistry::new(),
            latches: LifecycleLatches::new(),
        }
    }

    #[inline]
    pub fn host(&self) -> &dyn Host {
        &*self.host
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn mounts(&self) -> &MountRegistry {
        &self.mounts
    }

    #[inline]
    pub fn latches(&self) -> &LifecycleLatches {
        &self.latches
    }

    /// Print the command table.
    pub fn log_commands(&self) {
        info!("KernelSU IOCTL Commands:");
        for c in COMMANDS {
            info!("  {:<18} = {:#010x}", c.name, c.opcode);
        }
    }

    /// Dispatch one request.
    ///
    /// # Returns
    /// The handler's value (zero, or a descriptor number for commands that
    /// create one) or the error that ended the request.
    pub fn dispatch(&self, opcode: u32, arg: UserPtr) -> Result<i32> {
        let host = self.host();
        debug!("ksu ioctl: cmd={:#x} from uid={}", opcode, host.current_uid());

        let Some(command) = lookup(opcode) else {
            warn!("ksu ioctl: unsupported command {:#x}", opcode);
            return Err(SupercallError::UnsupportedCommand);
        };

        let caller = Caller::current(host);
        if !command.permission.check(host, &caller) {
            warn!(
                "ksu ioctl: permission denied for cmd={:#x} uid={}",
                opcode, caller.uid
            );
            self.audit(&caller, command, AuditOutcome::Denied);
            return Err(SupercallError::PermissionDenied);
        }

        let result = (command.handler)(self, &caller, arg);
        let outcome = match result {
            Ok(_) => AuditOutcome::Success,
            Err(_) => AuditOutcome::Failed,
        };
        self.audit(&caller, command, outcome);
        result
    }

    /// Dispatch and flatten the result into the raw ioctl return value.
    pub fn ioctl(&self, opcode: u32, arg: UserPtr) -> i64 {
        into_raw(self.dispatch(opcode, arg))
    }

    fn audit(&self, caller: &Caller, command: &Command, outcome: AuditOutcome) {
        if !cfg!(feature = "sulog") {
            return;
        }
        if let Err(e) = self.host.report_syscall(caller.uid, command.name, outcome) {
            debug!("sulog: {} record for {} dropped: {}", outcome.as_str(), command.name, e);
        }
    }
}

impl core::fmt::Debug for Supercalls {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Supercalls")
            .field("config", &self.config)
            .field("mounts", &self.mounts)
            .field("latches", &self.latches)
            .finish_non_exhaustive()
    }
}
