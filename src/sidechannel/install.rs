//! Deferred Descriptor Installer
//!
//! Creates the driver descriptor in the requesting task's own context, just
//! before it resumes to user space, and writes the descriptor number back to
//! the location the task supplied.
//!
//! # Failure Handling
//! - No free slot, or the file cannot be created: nothing is installed and
//!   the negative errno is written back instead
//! - Write-back fails: the freshly installed descriptor is closed again

use alloc::boxed::Box;
use alloc::sync::Arc;

use log::{debug, error, info, warn};

use crate::config::DRIVER_NAME;
use crate::error::Result;
use crate::host::{DeferredWork, FileOps};
use crate::supercall::Supercalls;
use crate::user::{copy_to_user, UserPtr};

/// Operations behind an installed driver descriptor.
///
/// Requests on the descriptor go through the same command table as every
/// other caller; holding the descriptor grants nothing by itself.
pub struct DriverFile {
    core: Arc<Supercalls>,
}

impl DriverFile {
    pub fn new(core: Arc<Supercalls>) -> Self {
        Self { core }
    }
}

impl FileOps for DriverFile {
    fn ioctl(&self, cmd: u32, arg: UserPtr) -> i64 {
        self.core.ioctl(cmd, arg)
    }

    fn release(&self) {
        info!("ksu fd released");
    }
}

impl Supercalls {
    /// Install a driver descriptor into the current task.
    ///
    /// # Returns
    /// The descriptor number. On error no slot stays reserved.
    pub fn install_fd(self: &Arc<Self>) -> Result<i32> {
        let host = self.host();

        let fd = host.reserve_fd().map_err(|e| {
            error!("install_fd: failed to get unused fd: {}", e);
            e
        })?;

        let file: Arc<dyn FileOps> = Arc::new(DriverFile::new(Arc::clone(self)));
        if let Err(e) = host.install_file(fd, DRIVER_NAME, file) {
            error!("install_fd: failed to create anon inode file: {}", e);
            host.release_fd(fd);
            return Err(e);
        }

        if cfg!(feature = "sulog") {
            if let Err(e) =
                host.report_permission_check(host.current_uid(), &host.current_comm(), true)
            {
                debug!("sulog: install permission report dropped: {}", e);
            }
        }
        info!("ksu fd installed: {} for pid {}", fd, host.current_pid());
        Ok(fd)
    }

    /// Queue descriptor installation for when the current task resumes.
    ///
    /// A scheduling failure is logged and otherwise ignored; the caller
    /// simply never receives a descriptor.
    pub(crate) fn schedule_install(self: &Arc<Self>, outp: UserPtr) {
        let core = Arc::clone(self);
        let work: DeferredWork = Box::new(move || core.finish_install(outp));
        if let Err(e) = self.host().queue_task_work(work) {
            warn!("install fd add task_work failed: {}", e);
        }
    }

    fn finish_install(self: &Arc<Self>, outp: UserPtr) {
        let host = self.host();
        let fd = self.install_fd().unwrap_or_else(|e| e.errno());
        info!("[{}] install ksu fd: {}", host.current_pid(), fd);

        if copy_to_user(host, outp, &fd).is_err() {
            error!("install ksu fd reply err");
            if fd >= 0 {
                host.close_fd(fd);
            }
        }
    }
}
