//! Host Kernel Seams
//!
//! The control plane never touches kernel internals directly. Everything it
//! needs from the surrounding kernel (caller identity, user memory, the
//! allow-list store, descriptor tables, deferred task work) arrives through
//! the traits in this module. `Host` bundles them.

use alloc::boxed::Box;
use alloc::sync::Arc;

use crate::error::Result;
use crate::sidechannel::ExtensionCommand;
use crate::uapi::{AppProfile, DynamicManagerCmd, GetManagersCmd};
use crate::user::UserPtr;

/// Length of a task's command name, NUL included.
pub const TASK_COMM_LEN: usize = 16;

/// A task's command name as stored by the kernel.
pub type Comm = [u8; TASK_COMM_LEN];

/// Identity of the task issuing the current request.
pub trait CallerIdentity {
    fn current_uid(&self) -> u32;
    fn current_pid(&self) -> i32;
    fn current_comm(&self) -> Comm;
    /// Whether the current task is the registered manager.
    fn is_manager(&self) -> bool;
    /// App id of the most recently active manager, or `KSU_INVALID_APPID`.
    fn last_manager_appid(&self) -> i32;
}

/// Raw access to the current task's address space.
pub trait UserAccess {
    /// Fill `dst` from user memory; fails unless every byte was copied.
    fn read_user(&self, src: UserPtr, dst: &mut [u8]) -> Result<()>;
    /// Write `src` to user memory; fails unless every byte was copied.
    fn write_user(&self, dst: UserPtr, src: &[u8]) -> Result<()>;
    /// Copy a NUL-terminated string into `dst`.
    ///
    /// Returns the length before the NUL, or `dst.len()` when no NUL was
    /// found within the buffer.
    fn read_user_str(&self, src: UserPtr, dst: &mut [u8]) -> Result<usize>;
}

/// The persistent allow-list and app profile store.
pub trait RootPolicy {
    fn is_allow_uid(&self, uid: u32) -> bool;
    /// Fill `out` with allowed (or denied) uids and return how many were written.
    fn allow_list(&self, allow: bool, out: &mut [u32]) -> Option<usize>;
    fn uid_should_umount(&self, uid: u32) -> bool;
    /// Look up the profile keyed by `profile.key` / `profile.current_uid`.
    fn get_app_profile(&self, profile: &mut AppProfile) -> bool;
    fn set_app_profile(&self, profile: &AppProfile) -> bool;
    /// Switch the current task to its configured root profile.
    fn escape_with_root_profile(&self);
    fn is_safe_mode(&self) -> bool;
}

/// Value of a feature flag as reported by the feature store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureState {
    Unsupported,
    Value(u64),
    Failed(crate::error::SupercallError),
}

/// Task marking operation. A pid of zero addresses every process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOp {
    Get { pid: i32 },
    Mark { pid: i32 },
    Unmark { pid: i32 },
    Refresh,
}

/// Auxiliary kernel subsystems the control plane drives.
pub trait Subsystems {
    fn on_post_fs_data(&self);
    fn on_boot_completed(&self);
    fn on_module_mounted(&self);
    fn sulog_init(&self);
    fn dynamic_manager_init(&self);
    fn start_sdcard_monitor(&self);

    fn handle_sepolicy(&self, cmd: u64, arg: UserPtr) -> Result<i32>;
    fn feature(&self, id: u32) -> FeatureState;
    fn set_feature(&self, id: u32, value: u64) -> Result<()>;

    fn file_wrapper_available(&self) -> bool;
    /// Wrap descriptor `fd` and return the new descriptor.
    fn install_file_wrapper(&self, fd: u32) -> Result<i32>;

    fn manage_mark(&self, op: MarkOp) -> Result<u32>;
    fn nuke_ext4_sysfs(&self, mnt: &[u8]) -> Result<i32>;
    fn handle_dynamic_manager(&self, cmd: &mut DynamicManagerCmd) -> Result<()>;
    fn get_managers(&self, cmd: &mut GetManagersCmd) -> Result<()>;
}

/// Terminal outcome of a dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    Success,
    Denied,
    Failed,
}

impl AuditOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Denied => "DENIED",
            Self::Failed => "FAILED",
        }
    }
}

/// Destination for audit records. Failures are logged and dropped.
pub trait AuditSink {
    fn report_permission_check(&self, uid: u32, comm: &Comm, allowed: bool) -> Result<()>;
    fn report_syscall(&self, uid: u32, command: &'static str, outcome: AuditOutcome) -> Result<()>;
    fn report_manager_operation(&self, op: &'static str, uid: u32, target_uid: i32) -> Result<()>;
}

/// Operations backing an installed descriptor.
pub trait FileOps: Send + Sync {
    /// Handle an ioctl; returns a value or a negative errno.
    fn ioctl(&self, cmd: u32, arg: UserPtr) -> i64;

    fn compat_ioctl(&self, cmd: u32, arg: UserPtr) -> i64 {
        self.ioctl(cmd, arg)
    }

    /// Last reference to the descriptor dropped.
    fn release(&self);
}

/// Work run in the originating task's context before it returns to user space.
pub type DeferredWork = Box<dyn FnOnce() + Send>;

/// Descriptor table and task-work queue of the current task.
pub trait TaskContext {
    /// Reserve an unused descriptor slot (close-on-exec).
    fn reserve_fd(&self) -> Result<i32>;
    /// Return a reserved slot that was never installed.
    fn release_fd(&self, fd: i32);
    /// Create an anonymous file backed by `file` and install it at `fd`.
    fn install_file(&self, fd: i32, name: &'static str, file: Arc<dyn FileOps>) -> Result<()>;
    fn close_fd(&self, fd: i32);
    /// Queue `work` to run when the current task resumes to user space.
    fn queue_task_work(&self, work: DeferredWork) -> Result<()>;
}

/// Receiver for side-channel extension commands.
pub trait Extensions {
    fn run_extension(&self, cmd: ExtensionCommand, arg: UserPtr);
}

/// Everything the control plane needs from the host kernel.
pub trait Host:
    CallerIdentity + UserAccess + RootPolicy + Subsystems + AuditSink + TaskContext + Extensions + Send + Sync
{
}

impl<T> Host for T where
    T: CallerIdentity
        + UserAccess
        + RootPolicy
        + Subsystems
        + AuditSink
        + TaskContext
        + Extensions
        + Send
        + Sync
{
}
