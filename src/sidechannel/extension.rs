//! Extension command namespace
//!
//! Sub-opcodes carried in the third reboot argument once the extension
//! handshake matched. Payload layouts belong to the receiving subsystem;
//! this layer only decodes the selector.

/// Raw sub-opcode values.
pub mod raw {
    pub const ADD_SUS_PATH: u32 = 0x55550;
    pub const SET_ANDROID_DATA_ROOT_PATH: u32 = 0x55551;
    pub const SET_SDCARD_ROOT_PATH: u32 = 0x55552;
    pub const ADD_SUS_PATH_LOOP: u32 = 0x55553;
    pub const HIDE_SUS_MNTS_FOR_NON_SU_PROCS: u32 = 0x55561;
    pub const ADD_SUS_KSTAT: u32 = 0x55570;
    pub const UPDATE_SUS_KSTAT: u32 = 0x55571;
    pub const ADD_SUS_KSTAT_STATICALLY: u32 = 0x55572;
    pub const SET_UNAME: u32 = 0x55590;
    pub const ENABLE_LOG: u32 = 0x555a0;
    pub const SET_CMDLINE_OR_BOOTCONFIG: u32 = 0x555b0;
    pub const ADD_OPEN_REDIRECT: u32 = 0x555c0;
    pub const SHOW_VERSION: u32 = 0x555e1;
    pub const SHOW_ENABLED_FEATURES: u32 = 0x555e2;
    pub const SHOW_VARIANT: u32 = 0x555e3;
    pub const ENABLE_AVC_LOG_SPOOFING: u32 = 0x60010;
    pub const ADD_SUS_MAP: u32 = 0x60020;
}

/// A decoded extension command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionCommand {
    AddSusPath,
    AddSusPathLoop,
    SetAndroidDataRootPath,
    SetSdcardRootPath,
    HideSusMountsForNonSuProcs,
    AddSusKstat,
    UpdateSusKstat,
    AddSusKstatStatically,
    SetUname,
    EnableLog,
    SetCmdlineOrBootconfig,
    AddOpenRedirect,
    AddSusMap,
    EnableAvcLogSpoofing,
    ShowEnabledFeatures,
    ShowVariant,
    ShowVersion,
}

impl ExtensionCommand {
    pub const fn from_raw(cmd: u32) -> Option<Self> {
        Some(match cmd {
            raw::ADD_SUS_PATH => Self::AddSusPath,
            raw::ADD_SUS_PATH_LOOP => Self::AddSusPathLoop,
            raw::SET_ANDROID_DATA_ROOT_PATH => Self::SetAndroidDataRootPath,
            raw::SET_SDCARD_ROOT_PATH => Self::SetSdcardRootPath,
            raw::HIDE_SUS_MNTS_FOR_NON_SU_PROCS => Self::HideSusMountsForNonSuProcs,
            raw::ADD_SUS_KSTAT => Self::AddSusKstat,
            raw::UPDATE_SUS_KSTAT => Self::UpdateSusKstat,
            raw::ADD_SUS_KSTAT_STATICALLY => Self::AddSusKstatStatically,
            raw::SET_UNAME => Self::SetUname,
            raw::ENABLE_LOG => Self::EnableLog,
            raw::SET_CMDLINE_OR_BOOTCONFIG => Self::SetCmdlineOrBootconfig,
            raw::ADD_OPEN_REDIRECT => Self::AddOpenRedirect,
            raw::ADD_SUS_MAP => Self::AddSusMap,
            raw::ENABLE_AVC_LOG_SPOOFING => Self::EnableAvcLogSpoofing,
            raw::SHOW_ENABLED_FEATURES => Self::ShowEnabledFeatures,
            raw::SHOW_VARIANT => Self::ShowVariant,
            raw::SHOW_VERSION => Self::ShowVersion,
            _ => return None,
        })
    }
}
