//! Boot Lifecycle Latches
//!
//! The userspace daemon reports boot phases. Some phases gate one-time
//! initialization and must never re-run, even when several tasks report the
//! same phase at once; others fire once per module and always run.

use core::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};

use crate::host::Host;
use crate::uapi::event;

/// A boolean that can move from false to true exactly once.
#[derive(Debug, Default)]
pub struct Latch(AtomicBool);

impl Latch {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Close the latch. Returns true only for the single caller that closed it.
    #[inline]
    pub fn trip(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub fn is_tripped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Lifecycle events understood by REPORT_EVENT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    PostFsData,
    BootCompleted,
    ModuleMounted,
}

impl LifecycleEvent {
    /// Decode a raw event kind. Unknown kinds yield `None`.
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            event::POST_FS_DATA => Some(Self::PostFsData),
            event::BOOT_COMPLETED => Some(Self::BootCompleted),
            event::MODULE_MOUNTED => Some(Self::ModuleMounted),
            _ => None,
        }
    }
}

/// One latch per one-shot boot phase.
#[derive(Debug, Default)]
pub struct LifecycleLatches {
    post_fs_data: Latch,
    boot_completed: Latch,
}

impl LifecycleLatches {
    pub const fn new() -> Self {
        Self {
            post_fs_data: Latch::new(),
            boot_completed: Latch::new(),
        }
    }

    pub fn post_fs_data_reached(&self) -> bool {
        self.post_fs_data.is_tripped()
    }

    pub fn boot_completed(&self) -> bool {
        self.boot_completed.is_tripped()
    }

    /// Handle a reported event kind.
    ///
    /// Repeated one-shot events and unknown kinds are no-ops. This never fails.
    pub fn report(&self, host: &dyn Host, raw: u32) {
        let Some(ev) = LifecycleEvent::from_raw(raw) else {
            debug!("report_event: ignoring unknown event {}", raw);
            return;
        };

        match ev {
            LifecycleEvent::PostFsData => {
                if self.post_fs_data.trip() {
                    info!("post-fs-data triggered");
                    host.on_post_fs_data();
                    if cfg!(feature = "sulog") {
                        host.sulog_init();
                    }
                    host.dynamic_manager_init();
                }
            }
            LifecycleEvent::BootCompleted => {
                if self.boot_completed.trip() {
                    info!("boot_complete triggered");
                    host.on_boot_completed();
                    if cfg!(feature = "susfs") {
                        host.start_sdcard_monitor();
                    }
                }
            }
            LifecycleEvent::ModuleMounted => {
                info!("module mounted!");
                host.on_module_mounted();
            }
        }
    }
}
