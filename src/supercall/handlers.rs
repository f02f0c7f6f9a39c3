//! Command handlers
//!
//! Each handler validates and copies its own request structure, works on the
//! kernel-side copy, and copies the reply back only on success. Handlers are
//! reached only after the command's permission predicate passed.

use log::{debug, error, info, warn};

use crate::config::KSU_FEATURE_MAX;
use crate::error::{Result, SupercallError};
use crate::host::{FeatureState, MarkOp};
use crate::mount::{display_path, UmountFlags, UmountMode};
use crate::uapi::{
    dynamic_manager_op, mark_op, strscpy, AddTryUmountCmd, AppProfileCmd, CheckSafemodeCmd,
    DynamicManagerCmd, EnableKpmCmd, GetAllowListCmd, GetFeatureCmd, GetFullVersionCmd,
    GetInfoCmd, GetManagerAppidCmd, GetManagersCmd, GetWrapperFdCmd, HookTypeCmd, InfoFlags,
    ManageMarkCmd, NukeExt4SysfsCmd, Plain, ReportEventCmd, SetFeatureCmd, SetSepolicyCmd,
    UidGrantedRootCmd, UidShouldUmountCmd, ALLOW_LIST_MAX,
};
use crate::user::{copy_from_user, copy_to_user, read_path, UserPtr};

use super::permission::Caller;
use super::Supercalls;

/// Copy the request structure in, logging a fault under `what`.
fn request<T: Plain>(sc: &Supercalls, arg: UserPtr, what: &str) -> Result<T> {
    copy_from_user(sc.host(), arg).map_err(|e| {
        error!("{}: copy_from_user failed", what);
        e
    })
}

/// Copy the reply structure out, logging a fault under `what`.
fn reply<T: Plain>(sc: &Supercalls, arg: UserPtr, value: &T, what: &str) -> Result<i32> {
    copy_to_user(sc.host(), arg, value).map_err(|e| {
        error!("{}: copy_to_user failed", what);
        e
    })?;
    Ok(0)
}

/// Grant root to the caller
///
/// Switches the calling task to its root profile in place.
///
/// # Security
/// Reached only when the caller's uid is on the allow list or already root.
pub(super) fn grant_root(sc: &Supercalls, caller: &Caller, _arg: UserPtr) -> Result<i32> {
    info!("allow root for: {}", caller.uid);
    sc.host().escape_with_root_profile();
    Ok(0)
}

/// Report version, flags and the feature count
///
/// The `MANAGER` flag reflects the caller, so the same request answers
/// differently for the manager and for an ordinary app.
pub(super) fn get_info(sc: &Supercalls, caller: &Caller, arg: UserPtr) -> Result<i32> {
    let mut flags = InfoFlags::empty();
    if sc.config().loadable_module {
        flags |= InfoFlags::LKM;
    }
    if caller.manager {
        flags |= InfoFlags::MANAGER;
    }
    let cmd = GetInfoCmd {
        version: sc.config().version,
        flags: flags.bits(),
        features: KSU_FEATURE_MAX,
    };
    reply(sc, arg, &cmd, "get_info")
}

/// Forward a boot lifecycle event to the latches.
///
/// Unknown event numbers are accepted and ignored.
pub(super) fn report_event(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    let cmd: ReportEventCmd = request(sc, arg, "report_event")?;
    sc.latches().report(sc.host(), cmd.event);
    Ok(0)
}

/// Apply a policy patch
///
/// The request only carries a sub-command and a user pointer; the policy
/// subsystem reads and validates the payload itself.
///
/// # Returns
/// Whatever the policy subsystem returns.
///
/// # Security
/// - Root only: a policy patch can widen every domain on the system
/// - The payload pointer is passed through unread
pub(super) fn set_sepolicy(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    let cmd: SetSepolicyCmd = request(sc, arg, "set_sepolicy")?;
    sc.host().handle_sepolicy(cmd.cmd, UserPtr::new(cmd.arg))
}

/// Whether the device booted into safe mode.
pub(super) fn check_safemode(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    let in_safe_mode = sc.host().is_safe_mode();
    if in_safe_mode {
        warn!("safemode enabled!");
    }
    let cmd = CheckSafemodeCmd {
        in_safe_mode: in_safe_mode as u8,
    };
    reply(sc, arg, &cmd, "check_safemode")
}

fn list_uids(sc: &Supercalls, arg: UserPtr, allow: bool, what: &str) -> Result<i32> {
    let mut cmd: GetAllowListCmd = request(sc, arg, what)?;
    let count = sc
        .host()
        .allow_list(allow, &mut cmd.uids)
        .ok_or(SupercallError::CopyFault)?;
    cmd.count = count.min(ALLOW_LIST_MAX) as u32;
    reply(sc, arg, &cmd, what)
}

/// Uids allowed to request root.
pub(super) fn get_allow_list(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    list_uids(sc, arg, true, "get_allow_list")
}

/// Uids whose mounts are hidden.
pub(super) fn get_deny_list(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    list_uids(sc, arg, false, "get_deny_list")
}

/// Whether `uid` may request root.
pub(super) fn uid_granted_root(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    let mut cmd: UidGrantedRootCmd = request(sc, arg, "uid_granted_root")?;
    cmd.granted = sc.host().is_allow_uid(cmd.uid) as u8;
    reply(sc, arg, &cmd, "uid_granted_root")
}

/// Whether mounts should be hidden from `uid`.
pub(super) fn uid_should_umount(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    let mut cmd: UidShouldUmountCmd = request(sc, arg, "uid_should_umount")?;
    cmd.should_umount = sc.host().uid_should_umount(cmd.uid) as u8;
    reply(sc, arg, &cmd, "uid_should_umount")
}

/// Report the manager app id
///
/// Zygisk implementations use this to find the root manager: the last
/// manager that was opened, else the first registered one, else
/// `KSU_INVALID_APPID`.
pub(super) fn get_manager_appid(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    let cmd = GetManagerAppidCmd {
        appid: sc.host().last_manager_appid(),
    };
    reply(sc, arg, &cmd, "get_manager_appid")
}

/// Fill in the stored profile for the requested key and uid.
///
/// `NotFound` when no profile is stored.
pub(super) fn get_app_profile(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    let mut cmd: AppProfileCmd = request(sc, arg, "get_app_profile")?;
    if !sc.host().get_app_profile(&mut cmd.profile) {
        return Err(SupercallError::NotFound);
    }
    reply(sc, arg, &cmd, "get_app_profile")
}

/// Store an app profile
///
/// A rejected profile is recorded as a manager operation before the error
/// is returned.
pub(super) fn set_app_profile(sc: &Supercalls, caller: &Caller, arg: UserPtr) -> Result<i32> {
    let cmd: AppProfileCmd = request(sc, arg, "set_app_profile")?;
    if !sc.host().set_app_profile(&cmd.profile) {
        if cfg!(feature = "sulog") {
            if let Err(e) = sc.host().report_manager_operation(
                "SET_APP_PROFILE",
                caller.uid,
                cmd.profile.current_uid,
            ) {
                debug!("sulog: SET_APP_PROFILE report dropped: {}", e);
            }
        }
        return Err(SupercallError::CopyFault);
    }
    Ok(0)
}

/// Read a feature value
///
/// An unsupported feature is not an error: the reply has `supported == 0`.
/// A feature whose getter fails returns that error and writes nothing back.
pub(super) fn get_feature(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    let mut cmd: GetFeatureCmd = request(sc, arg, "get_feature")?;
    match sc.host().feature(cmd.feature_id) {
        FeatureState::Unsupported => {
            cmd.value = 0;
            cmd.supported = 0;
        }
        FeatureState::Value(value) => {
            cmd.value = value;
            cmd.supported = 1;
        }
        FeatureState::Failed(e) => {
            error!("get_feature: failed for feature {}: {}", cmd.feature_id, e.errno());
            return Err(e);
        }
    }
    reply(sc, arg, &cmd, "get_feature")
}

/// Write a feature value; the subsystem's error is returned unchanged.
pub(super) fn set_feature(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    let cmd: SetFeatureCmd = request(sc, arg, "set_feature")?;
    sc.host()
        .set_feature(cmd.feature_id, cmd.value)
        .map_err(|e| {
            error!("set_feature: failed for feature {}: {}", cmd.feature_id, e.errno());
            e
        })?;
    Ok(0)
}

/// Wrap one of the caller's descriptors
///
/// # Returns
/// The wrapper descriptor on success.
pub(super) fn get_wrapper_fd(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    if !sc.host().file_wrapper_available() {
        return Err(SupercallError::BadArgument);
    }
    let cmd: GetWrapperFdCmd = request(sc, arg, "get_wrapper_fd")?;
    sc.host().install_file_wrapper(cmd.fd)
}

/// Get, set or clear the process mark, or refresh all marks
///
/// Only a `GET` writes its result back into the request.
pub(super) fn manage_mark(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    let mut cmd: ManageMarkCmd = request(sc, arg, "manage_mark")?;
    let op = match cmd.operation {
        mark_op::GET => MarkOp::Get { pid: cmd.pid },
        mark_op::MARK => MarkOp::Mark { pid: cmd.pid },
        mark_op::UNMARK => MarkOp::Unmark { pid: cmd.pid },
        mark_op::REFRESH => MarkOp::Refresh,
        other => {
            error!("manage_mark: invalid operation {}", other);
            return Err(SupercallError::BadArgument);
        }
    };

    let result = sc.host().manage_mark(op).map_err(|e| {
        error!("manage_mark: {:?} failed: {}", op, e.errno());
        e
    })?;
    if let MarkOp::Get { .. } = op {
        cmd.result = result as u64;
    }
    reply(sc, arg, &cmd, "manage_mark")
}

/// Remove the sysfs entries of an ext4 mount
///
/// # Arguments
/// * `arg` - request whose `arg` field points at the mount path
///
/// # Security
/// - A null path pointer is rejected before any user memory is read
/// - The path is bounded by the path buffer; no terminator within it is
///   `BadArgument`
/// - Destructive and visible system wide, so manager or root only
pub(super) fn nuke_ext4_sysfs(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    let cmd: NukeExt4SysfsCmd = request(sc, arg, "nuke_ext4_sysfs")?;
    if cmd.arg == 0 {
        return Err(SupercallError::BadArgument);
    }
    let mnt = read_path(sc.host(), UserPtr::new(cmd.arg)).map_err(|e| {
        error!("nuke_ext4_sysfs: copy mnt failed: {}", e);
        e
    })?;
    info!("nuke_ext4_sysfs: {}", display_path(&mnt));
    sc.host().nuke_ext4_sysfs(&mnt)
}

/// Edit the try-umount registry
///
/// # Arguments
/// * `arg` - request with the mode, umount flags and a path pointer
///
/// # Returns
/// 0 on success; `Wipe` ignores the path entirely.
///
/// # Security
/// - Manager or root only: every listed path is unmounted for denied apps
/// - Paths are copied and bounded before the registry lock is taken
/// - Deleting an empty path is `BadArgument`, never a wildcard
pub(super) fn add_try_umount(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    let cmd: AddTryUmountCmd = request(sc, arg, "add_try_umount")?;
    let mode = UmountMode::try_from(cmd.mode).map_err(|e| {
        error!("add_try_umount: invalid operation {}", cmd.mode);
        e
    })?;

    match mode {
        UmountMode::Wipe => {
            sc.mounts().wipe();
        }
        UmountMode::Add => {
            let path = read_path(sc.host(), UserPtr::new(cmd.arg))?;
            sc.mounts()
                .add(&path, UmountFlags::from_bits_retain(cmd.flags))?;
        }
        UmountMode::Delete => {
            let path = read_path(sc.host(), UserPtr::new(cmd.arg))?;
            if path.is_empty() {
                return Err(SupercallError::BadArgument);
            }
            sc.mounts().remove(&path);
        }
    }
    Ok(0)
}

/// Full version string, NUL terminated and truncated to the buffer.
pub(super) fn get_full_version(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    let mut cmd = GetFullVersionCmd::zeroed();
    strscpy(&mut cmd.version_full, sc.config().version_full);
    reply(sc, arg, &cmd, "get_full_version")
}

/// Name of the syscall hook flavor built in.
pub(super) fn get_hook_type(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    let mut cmd = HookTypeCmd::zeroed();
    strscpy(&mut cmd.hook_type, sc.config().hook.as_str());
    reply(sc, arg, &cmd, "get_hook_type")
}

/// Whether kernel patch modules are enabled.
pub(super) fn enable_kpm(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    let cmd = EnableKpmCmd {
        enabled: sc.config().kpm_enabled as u8,
    };
    reply(sc, arg, &cmd, "enable_kpm")
}

/// Set, clear or read the dynamic manager signature.
///
/// Only `GET` writes the reply back.
pub(super) fn dynamic_manager(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    let mut cmd: DynamicManagerCmd = request(sc, arg, "dynamic_manager")?;
    sc.host().handle_dynamic_manager(&mut cmd)?;
    if cmd.operation == dynamic_manager_op::GET {
        reply(sc, arg, &cmd, "dynamic_manager")?;
    }
    Ok(0)
}

/// List the registered manager uids.
pub(super) fn get_managers(sc: &Supercalls, _caller: &Caller, arg: UserPtr) -> Result<i32> {
    let mut cmd: GetManagersCmd = request(sc, arg, "get_managers")?;
    sc.host().get_managers(&mut cmd)?;
    reply(sc, arg, &cmd, "get_managers")
}
