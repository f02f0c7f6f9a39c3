//! User-space ABI
//!
//! Opcode numbers and the fixed-layout request structures exchanged with the
//! manager. Every structure is `#[repr(C)]` with explicit padding so it can
//! be copied byte-for-byte in both directions.
//!
//! # Opcode Encoding
//! ```text
//! ┌──────┬──────────┬────────────┬──────────┐
//! │ dir  │ size (0) │ type ('K') │   nr     │
//! │ 31:30│  29:16   │   15:8     │   7:0    │
//! └──────┴──────────┴────────────┴──────────┘
//! ```
//! The size field is always zero so the host's generic ioctl size check
//! never interferes with the variable request structures.

use core::mem::size_of;
use core::slice;

use bitflags::bitflags;

const IOC_NONE: u32 = 0;
const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

/// Build an opcode from a direction and a sequence number.
pub const fn ioc(dir: u32, nr: u32) -> u32 {
    (dir << 30) | ((b'K' as u32) << 8) | nr
}

/// Opcode numbers of the command table.
pub mod opcode {
    use super::{ioc, IOC_NONE, IOC_READ, IOC_WRITE};

    const RW: u32 = IOC_READ | IOC_WRITE;

    pub const GRANT_ROOT: u32 = ioc(IOC_NONE, 1);
    pub const GET_INFO: u32 = ioc(IOC_READ, 2);
    pub const REPORT_EVENT: u32 = ioc(IOC_WRITE, 3);
    pub const SET_SEPOLICY: u32 = ioc(RW, 4);
    pub const CHECK_SAFEMODE: u32 = ioc(IOC_READ, 5);
    pub const GET_ALLOW_LIST: u32 = ioc(RW, 6);
    pub const GET_DENY_LIST: u32 = ioc(RW, 7);
    pub const UID_GRANTED_ROOT: u32 = ioc(RW, 8);
    pub const UID_SHOULD_UMOUNT: u32 = ioc(RW, 9);
    pub const GET_MANAGER_APPID: u32 = ioc(IOC_READ, 10);
    pub const GET_APP_PROFILE: u32 = ioc(RW, 11);
    pub const SET_APP_PROFILE: u32 = ioc(IOC_WRITE, 12);
    pub const GET_FEATURE: u32 = ioc(RW, 13);
    pub const SET_FEATURE: u32 = ioc(IOC_WRITE, 14);
    pub const GET_WRAPPER_FD: u32 = ioc(IOC_WRITE, 15);
    pub const MANAGE_MARK: u32 = ioc(RW, 16);
    pub const NUKE_EXT4_SYSFS: u32 = ioc(IOC_WRITE, 17);
    pub const ADD_TRY_UMOUNT: u32 = ioc(IOC_WRITE, 18);
    pub const GET_HOOK_MODE: u32 = ioc(IOC_READ, 98);
    pub const GET_FULL_VERSION: u32 = ioc(IOC_READ, 100);
    pub const HOOK_TYPE: u32 = ioc(IOC_READ, 101);
    pub const ENABLE_KPM: u32 = ioc(IOC_READ, 102);
    pub const DYNAMIC_MANAGER: u32 = ioc(RW, 103);
    pub const GET_MANAGERS: u32 = ioc(RW, 104);
}

/// Lifecycle event kinds carried by REPORT_EVENT.
pub mod event {
    pub const POST_FS_DATA: u32 = 1;
    pub const BOOT_COMPLETED: u32 = 2;
    pub const MODULE_MOUNTED: u32 = 3;
}

/// Sub-operations of ADD_TRY_UMOUNT.
pub mod umount_mode {
    pub const WIPE: u8 = 0;
    pub const ADD: u8 = 1;
    pub const DEL: u8 = 2;
}

/// Sub-operations of MANAGE_MARK.
pub mod mark_op {
    pub const GET: u32 = 1;
    pub const MARK: u32 = 2;
    pub const UNMARK: u32 = 3;
    pub const REFRESH: u32 = 4;
}

/// Sub-operations of SET_DYNAMIC_MANAGER.
pub mod dynamic_manager_op {
    pub const SET: u32 = 0;
    pub const GET: u32 = 1;
    pub const CLEAR: u32 = 2;
}

/// Plain-old-data that may be copied across the user boundary as bytes.
///
/// # Safety
/// Implementors must be `#[repr(C)]`, contain no implicit padding, and be
/// valid for every bit pattern (including all zeroes).
pub unsafe trait Plain: Copy + Send + 'static {
    /// An all-zero value.
    fn zeroed() -> Self {
        // SAFETY: all-zero is a valid bit pattern per the trait contract.
        unsafe { core::mem::zeroed() }
    }

    /// View the value as raw bytes.
    fn as_bytes(&self) -> &[u8] {
        // SAFETY: no padding, so every byte is initialized.
        unsafe { slice::from_raw_parts(self as *const Self as *const u8, size_of::<Self>()) }
    }

    /// View the value as mutable raw bytes.
    fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: any bit pattern is valid, so arbitrary writes are sound.
        unsafe { slice::from_raw_parts_mut(self as *mut Self as *mut u8, size_of::<Self>()) }
    }
}

// SAFETY: primitive integers have no padding and every bit pattern is valid.
unsafe impl Plain for i32 {}
// SAFETY: as for i32.
unsafe impl Plain for u32 {}

macro_rules! plain {
    ($($ty:ty),* $(,)?) => {
        $(
            // SAFETY: repr(C) with explicit padding fields, integer members only.
            unsafe impl Plain for $ty {}
        )*
    };
}

bitflags! {
    /// Flags reported by GET_INFO.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InfoFlags: u32 {
        /// Loaded as a kernel module.
        const LKM = 0x1;
        /// Caller is the registered manager.
        const MANAGER = 0x2;
    }
}

/// GET_INFO reply.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct GetInfoCmd {
    pub version: u32,
    pub flags: u32,
    pub features: u32,
}

/// REPORT_EVENT request.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct ReportEventCmd {
    pub event: u32,
}

/// SET_SEPOLICY request.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct SetSepolicyCmd {
    pub cmd: u64,
    pub arg: u64,
}

/// CHECK_SAFEMODE reply.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct CheckSafemodeCmd {
    pub in_safe_mode: u8,
}

/// Maximum uids returned by one allow/deny list query.
pub const ALLOW_LIST_MAX: usize = 128;

/// GET_ALLOW_LIST / GET_DENY_LIST reply.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct GetAllowListCmd {
    pub uids: [u32; ALLOW_LIST_MAX],
    pub count: u32,
}

/// UID_GRANTED_ROOT request and reply.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct UidGrantedRootCmd {
    pub uid: u32,
    pub granted: u8,
    pub _pad: [u8; 3],
}

/// UID_SHOULD_UMOUNT request and reply.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct UidShouldUmountCmd {
    pub uid: u32,
    pub should_umount: u8,
    pub _pad: [u8; 3],
}

/// Sentinel app id meaning "no manager".
pub const KSU_INVALID_APPID: i32 = -1;

/// GET_MANAGER_APPID reply.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct GetManagerAppidCmd {
    pub appid: i32,
}

/// Length of an app profile key (package name).
pub const APP_PROFILE_KEY_LEN: usize = 256;

/// Length of the opaque per-profile rule block.
pub const APP_PROFILE_CONFIG_LEN: usize = 512;

/// Per-app security profile. The rule block is interpreted by the store.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AppProfile {
    pub version: u32,
    pub key: [u8; APP_PROFILE_KEY_LEN],
    pub current_uid: i32,
    pub allow_su: u8,
    pub _pad: [u8; 3],
    pub config: [u8; APP_PROFILE_CONFIG_LEN],
}

/// GET_APP_PROFILE / SET_APP_PROFILE request.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AppProfileCmd {
    pub profile: AppProfile,
}

/// GET_FEATURE request and reply.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct GetFeatureCmd {
    pub feature_id: u32,
    pub _pad: u32,
    pub value: u64,
    pub supported: u8,
    pub _pad2: [u8; 7],
}

/// SET_FEATURE request.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct SetFeatureCmd {
    pub feature_id: u32,
    pub _pad: u32,
    pub value: u64,
}

/// GET_WRAPPER_FD request.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct GetWrapperFdCmd {
    pub fd: u32,
    pub flags: u32,
}

/// MANAGE_MARK request and reply.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct ManageMarkCmd {
    pub operation: u32,
    pub pid: i32,
    pub result: u64,
}

/// NUKE_EXT4_SYSFS request: `arg` points at a NUL-terminated mount path.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct NukeExt4SysfsCmd {
    pub arg: u64,
}

/// ADD_TRY_UMOUNT request: `arg` points at a NUL-terminated path.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AddTryUmountCmd {
    pub arg: u64,
    pub flags: u32,
    pub mode: u8,
    pub _pad: [u8; 3],
}

/// GET_FULL_VERSION reply.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct GetFullVersionCmd {
    pub version_full: [u8; 256],
}

/// GET_HOOK_TYPE reply.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct HookTypeCmd {
    pub hook_type: [u8; 32],
}

/// GET_ENABLE_KPM reply.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct EnableKpmCmd {
    pub enabled: u8,
}

/// SET_DYNAMIC_MANAGER request and reply.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct DynamicManagerCmd {
    pub operation: u32,
    pub size: u32,
    pub hash: [u8; 65],
    pub _pad: [u8; 3],
}

/// One registered manager.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct ManagerInfo {
    pub uid: u32,
    pub signature_index: i32,
}

/// GET_MANAGERS reply.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct GetManagersCmd {
    pub count: u16,
    pub _pad: u16,
    pub managers: [ManagerInfo; 2],
}

plain!(
    GetInfoCmd,
    ReportEventCmd,
    SetSepolicyCmd,
    CheckSafemodeCmd,
    GetAllowListCmd,
    UidGrantedRootCmd,
    UidShouldUmountCmd,
    GetManagerAppidCmd,
    AppProfile,
    AppProfileCmd,
    GetFeatureCmd,
    SetFeatureCmd,
    GetWrapperFdCmd,
    ManageMarkCmd,
    NukeExt4SysfsCmd,
    AddTryUmountCmd,
    GetFullVersionCmd,
    HookTypeCmd,
    EnableKpmCmd,
    DynamicManagerCmd,
    ManagerInfo,
    GetManagersCmd,
);

/// Copy `src` into a fixed buffer, truncating and always NUL-terminating.
pub fn strscpy(dst: &mut [u8], src: &str) {
    if dst.is_empty() {
        return;
    }
    let len = src.len().min(dst.len() - 1);
    dst[..len].copy_from_slice(&src.as_bytes()[..len]);
    dst[len..].fill(0);
}
