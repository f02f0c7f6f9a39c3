//! Caller identity and permission predicates
//!
//! Each command names one predicate. Predicates read the caller snapshot and
//! external stores but never mutate system state.

use log::debug;

use crate::host::{Comm, Host};

/// Snapshot of the requesting task, taken fresh for every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub uid: u32,
    pub pid: i32,
    pub comm: Comm,
    /// Registered manager at the time of the request.
    pub manager: bool,
}

impl Caller {
    pub fn current(host: &dyn Host) -> Self {
        Self {
            uid: host.current_uid(),
            pid: host.current_pid(),
            comm: host.current_comm(),
            manager: host.is_manager(),
        }
    }

    #[inline]
    pub const fn is_root(&self) -> bool {
        self.uid == 0
    }
}

pub fn only_root(caller: &Caller) -> bool {
    caller.is_root()
}

pub fn only_manager(caller: &Caller) -> bool {
    caller.manager
}

pub fn manager_or_root(caller: &Caller) -> bool {
    caller.is_root() || caller.manager
}

/// No check. Reserved for read-only, non-sensitive queries.
pub fn always_allow(_caller: &Caller) -> bool {
    true
}

/// Manager, or a uid on the allow-list.
///
/// The outcome is reported to the audit sink as a permission check; a sink
/// failure does not change the outcome.
pub fn allowed_for_su(host: &dyn Host, caller: &Caller) -> bool {
    let allowed = caller.manager || host.is_allow_uid(caller.uid);
    if cfg!(feature = "sulog") {
        if let Err(e) = host.report_permission_check(caller.uid, &caller.comm, allowed) {
            debug!("sulog: permission report dropped: {}", e);
        }
    }
    allowed
}

/// Predicate attached to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    OnlyRoot,
    OnlyManager,
    ManagerOrRoot,
    AlwaysAllow,
    AllowedForSu,
}

impl Permission {
    pub fn check(self, host: &dyn Host, caller: &Caller) -> bool {
        match self {
            Self::OnlyRoot => only_root(caller),
            Self::OnlyManager => only_manager(caller),
            Self::ManagerOrRoot => manager_or_root(caller),
            Self::AlwaysAllow => always_allow(caller),
            Self::AllowedForSu => allowed_for_su(host, caller),
        }
    }
}
