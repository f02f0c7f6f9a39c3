//! Build-time constants and runtime configuration
//!
//! Constants fix the wire contract with user space. `Config` carries the
//! values reported back to callers; its default is derived from the
//! constants and the enabled Cargo features.

/// Version code reported by GET_INFO.
pub const KERNEL_SU_VERSION: u32 = 12_882;

/// Full version string reported by GET_FULL_VERSION.
pub const KSU_VERSION_FULL: &str = "v1.0.5-supercalls@main";

/// Highest feature id understood by the feature store.
pub const KSU_FEATURE_MAX: u32 = 5;

/// First side-channel magic: selects the install protocol.
pub const KSU_INSTALL_MAGIC1: u32 = 0xDEAD_BEEF;

/// Second side-channel magic: requests a driver descriptor.
pub const KSU_INSTALL_MAGIC2: u32 = 0xCAFE_BABE;

/// Second side-channel magic: selects the extension command namespace.
pub const SUSFS_MAGIC: u32 = 0xFAFA_FAFA;

/// Size of the kernel-side path buffer, NUL included.
pub const PATH_BUF_LEN: usize = 256;

/// Name given to the anonymous driver file.
pub const DRIVER_NAME: &str = "[ksu_driver]";

/// How the host kernel intercepts syscalls. Reported to user space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Tracepoint,
    Manual,
    Inline,
}

impl HookKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tracepoint => "Tracepoint",
            Self::Manual => "Manual",
            Self::Inline => "Inline",
        }
    }

    /// Hook kind selected by Cargo features.
    pub const fn from_features() -> Self {
        if cfg!(feature = "manual-hook") {
            Self::Manual
        } else if cfg!(feature = "susfs") {
            Self::Inline
        } else {
            Self::Tracepoint
        }
    }
}

/// Runtime configuration reported through the info opcodes.
#[derive(Debug, Clone)]
pub struct Config {
    /// Version code.
    pub version: u32,
    /// Human-readable version.
    pub version_full: &'static str,
    /// Loaded as a module rather than built in.
    pub loadable_module: bool,
    /// Hook implementation in use.
    pub hook: HookKind,
    /// Kernel patch module facility available.
    pub kpm_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: KERNEL_SU_VERSION,
            version_full: KSU_VERSION_FULL,
            loadable_module: false,
            hook: HookKind::from_features(),
            kpm_enabled: false,
        }
    }
}
