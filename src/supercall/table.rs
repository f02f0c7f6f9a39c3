//! The command table
//!
//! Built at compile time and never mutated. Opcodes are unique, so lookup by
//! linear scan finds at most one entry.

use crate::error::Result;
use crate::uapi::opcode;
use crate::user::UserPtr;

use super::handlers::*;
use super::permission::{Caller, Permission};
use super::Supercalls;

/// Handler invoked once the permission predicate passed.
pub type Handler = fn(&Supercalls, &Caller, UserPtr) -> Result<i32>;

/// One entry of the command table.
#[derive(Clone, Copy)]
pub struct Command {
    pub opcode: u32,
    /// Diagnostic name, used in logs and audit records.
    pub name: &'static str,
    pub handler: Handler,
    pub permission: Permission,
}

impl core::fmt::Debug for Command {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Command({}, {:#010x}, {:?})", self.name, self.opcode, self.permission)
    }
}

const fn cmd(opcode: u32, name: &'static str, handler: Handler, permission: Permission) -> Command {
    Command {
        opcode,
        name,
        handler,
        permission,
    }
}

use Permission::*;

pub static COMMANDS: &[Command] = &[
    cmd(opcode::GRANT_ROOT, "GRANT_ROOT", grant_root, AllowedForSu),
    cmd(opcode::GET_INFO, "GET_INFO", get_info, AlwaysAllow),
    cmd(opcode::REPORT_EVENT, "REPORT_EVENT", report_event, OnlyRoot),
    cmd(opcode::SET_SEPOLICY, "SET_SEPOLICY", set_sepolicy, OnlyRoot),
    cmd(opcode::CHECK_SAFEMODE, "CHECK_SAFEMODE", check_safemode, AlwaysAllow),
    cmd(opcode::GET_ALLOW_LIST, "GET_ALLOW_LIST", get_allow_list, ManagerOrRoot),
    cmd(opcode::GET_DENY_LIST, "GET_DENY_LIST", get_deny_list, ManagerOrRoot),
    cmd(opcode::UID_GRANTED_ROOT, "UID_GRANTED_ROOT", uid_granted_root, ManagerOrRoot),
    cmd(opcode::UID_SHOULD_UMOUNT, "UID_SHOULD_UMOUNT", uid_should_umount, ManagerOrRoot),
    cmd(opcode::GET_MANAGER_APPID, "GET_MANAGER_APPID", get_manager_appid, ManagerOrRoot),
    cmd(opcode::GET_APP_PROFILE, "GET_APP_PROFILE", get_app_profile, OnlyManager),
    cmd(opcode::SET_APP_PROFILE, "SET_APP_PROFILE", set_app_profile, OnlyManager),
    cmd(opcode::GET_FEATURE, "GET_FEATURE", get_feature, ManagerOrRoot),
    cmd(opcode::SET_FEATURE, "SET_FEATURE", set_feature, ManagerOrRoot),
    cmd(opcode::GET_WRAPPER_FD, "GET_WRAPPER_FD", get_wrapper_fd, ManagerOrRoot),
    cmd(opcode::MANAGE_MARK, "MANAGE_MARK", manage_mark, ManagerOrRoot),
    cmd(opcode::NUKE_EXT4_SYSFS, "NUKE_EXT4_SYSFS", nuke_ext4_sysfs, ManagerOrRoot),
    cmd(opcode::ADD_TRY_UMOUNT, "ADD_TRY_UMOUNT", add_try_umount, ManagerOrRoot),
    cmd(opcode::GET_FULL_VERSION, "GET_FULL_VERSION", get_full_version, AlwaysAllow),
    cmd(opcode::HOOK_TYPE, "GET_HOOK_TYPE", get_hook_type, ManagerOrRoot),
    // Alias kept for managers written against the older numbering.
    cmd(opcode::GET_HOOK_MODE, "GET_HOOK_MODE", get_hook_type, ManagerOrRoot),
    cmd(opcode::ENABLE_KPM, "GET_ENABLE_KPM", enable_kpm, ManagerOrRoot),
    cmd(opcode::DYNAMIC_MANAGER, "SET_DYNAMIC_MANAGER", dynamic_manager, OnlyRoot),
    cmd(opcode::GET_MANAGERS, "GET_MANAGERS", get_managers, ManagerOrRoot),
];

/// Find the command registered for `opcode`.
pub fn lookup(opcode: u32) -> Option<&'static Command> {
    COMMANDS.iter().find(|c| c.opcode == opcode)
}
