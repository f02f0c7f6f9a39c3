//! In-memory host used by the unit tests.
//!
//! User memory is a set of disjoint regions starting at `USER_BASE` with an
//! unmapped gap after each one, so reads past a region's end fault.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::Ordering::SeqCst;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicUsize};
use std::sync::Arc;

use spin::Mutex;

use crate::error::{Result, SupercallError};
use crate::host::{
    AuditOutcome, AuditSink, CallerIdentity, Comm, DeferredWork, Extensions, FeatureState,
    FileOps, MarkOp, RootPolicy, Subsystems, TaskContext, UserAccess,
};
use crate::sidechannel::ExtensionCommand;
use crate::uapi::{
    dynamic_manager_op, AppProfile, DynamicManagerCmd, GetManagersCmd, ManagerInfo, Plain,
    KSU_INVALID_APPID,
};
use crate::user::{copy_from_user, UserPtr};

const USER_BASE: u64 = 0x1000_0000;
const USER_GAP: u64 = 0x1000;
const FIRST_FD: i32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditRecord {
    Syscall {
        uid: u32,
        command: &'static str,
        outcome: AuditOutcome,
    },
    Permission {
        uid: u32,
        allowed: bool,
    },
    ManagerOp {
        op: &'static str,
        uid: u32,
        target: i32,
    },
}

/// Call counts for the lifecycle and descriptor hooks.
#[derive(Debug, Default)]
pub struct Counters {
    pub post_fs_data: AtomicUsize,
    pub boot_completed: AtomicUsize,
    pub module_mounted: AtomicUsize,
    pub sulog_init: AtomicUsize,
    pub dynamic_manager_init: AtomicUsize,
    pub sdcard_monitor: AtomicUsize,
    pub escape_root: AtomicUsize,
    pub released: AtomicUsize,
}

impl Counters {
    pub fn total_lifecycle(&self) -> usize {
        [
            &self.post_fs_data,
            &self.boot_completed,
            &self.module_mounted,
            &self.sulog_init,
            &self.dynamic_manager_init,
            &self.sdcard_monitor,
        ]
        .iter()
        .map(|c| c.load(SeqCst))
        .sum()
    }
}

struct Region {
    base: u64,
    bytes: Vec<u8>,
}

impl Region {
    fn slice(&self, addr: u64, len: usize) -> Option<core::ops::Range<usize>> {
        let start = addr.checked_sub(self.base)? as usize;
        let end = start.checked_add(len)?;
        (end <= self.bytes.len()).then_some(start..end)
    }
}

#[derive(Default)]
struct UserMemory {
    regions: Vec<Region>,
    next: u64,
}

impl UserMemory {
    fn find(&self, addr: u64) -> Option<&Region> {
        self.regions
            .iter()
            .find(|r| addr >= r.base && addr < r.base + r.bytes.len() as u64)
    }

    fn find_mut(&mut self, addr: u64) -> Option<&mut Region> {
        self.regions
            .iter_mut()
            .find(|r| addr >= r.base && addr < r.base + r.bytes.len() as u64)
    }
}

struct FdTable {
    files: BTreeMap<i32, (&'static str, Arc<dyn FileOps>)>,
    reserved: BTreeSet<i32>,
    limit: usize,
}

impl FdTable {
    fn in_use(&self, fd: i32) -> bool {
        self.files.contains_key(&fd) || self.reserved.contains(&fd)
    }
}

pub struct TestHost {
    uid: AtomicU32,
    pid: AtomicI32,
    manager: AtomicBool,
    last_manager_appid: AtomicI32,

    memory: Mutex<UserMemory>,

    pub allow: Mutex<Vec<u32>>,
    pub deny: Mutex<Vec<u32>>,
    pub profiles: Mutex<Vec<AppProfile>>,
    pub reject_profiles: AtomicBool,
    pub fail_allow_list: AtomicBool,
    pub safe_mode: AtomicBool,

    pub features: Mutex<BTreeMap<u32, u64>>,
    pub feature_errors: Mutex<BTreeMap<u32, SupercallError>>,
    pub set_feature_error: Mutex<Option<SupercallError>>,
    pub wrapper: AtomicBool,
    pub marked: Mutex<BTreeSet<i32>>,
    pub nuked: Mutex<Vec<Vec<u8>>>,
    pub sepolicy: Mutex<Vec<(u64, UserPtr)>>,
    pub dynamic: Mutex<Option<(u32, [u8; 65])>>,
    pub managers: Mutex<Vec<ManagerInfo>>,
    pub extensions: Mutex<Vec<(ExtensionCommand, UserPtr)>>,

    pub counters: Counters,
    pub audit: Mutex<Vec<AuditRecord>>,
    audit_fails: AtomicBool,

    fds: Mutex<FdTable>,
    fail_install: AtomicBool,
    task_work: Mutex<Vec<DeferredWork>>,
    task_work_fails: AtomicBool,
}

impl TestHost {
    /// A host whose current task is root and not the manager.
    pub fn new() -> Self {
        Self {
            uid: AtomicU32::new(0),
            pid: AtomicI32::new(1000),
            manager: AtomicBool::new(false),
            last_manager_appid: AtomicI32::new(KSU_INVALID_APPID),
            memory: Mutex::new(UserMemory {
                regions: Vec::new(),
                next: USER_BASE,
            }),
            allow: Mutex::new(Vec::new()),
            deny: Mutex::new(Vec::new()),
            profiles: Mutex::new(Vec::new()),
            reject_profiles: AtomicBool::new(false),
            fail_allow_list: AtomicBool::new(false),
            safe_mode: AtomicBool::new(false),
            features: Mutex::new(BTreeMap::new()),
            feature_errors: Mutex::new(BTreeMap::new()),
            set_feature_error: Mutex::new(None),
            wrapper: AtomicBool::new(false),
            marked: Mutex::new(BTreeSet::new()),
            nuked: Mutex::new(Vec::new()),
            sepolicy: Mutex::new(Vec::new()),
            dynamic: Mutex::new(None),
            managers: Mutex::new(Vec::new()),
            extensions: Mutex::new(Vec::new()),
            counters: Counters::default(),
            audit: Mutex::new(Vec::new()),
            audit_fails: AtomicBool::new(false),
            fds: Mutex::new(FdTable {
                files: BTreeMap::new(),
                reserved: BTreeSet::new(),
                limit: 64,
            }),
            fail_install: AtomicBool::new(false),
            task_work: Mutex::new(Vec::new()),
            task_work_fails: AtomicBool::new(false),
        }
    }

    /// Switch to an ordinary task with `uid`.
    pub fn set_uid(&self, uid: u32) {
        self.uid.store(uid, SeqCst);
        self.manager.store(false, SeqCst);
    }

    /// Switch to the registered manager running as `uid`.
    pub fn set_manager(&self, uid: u32) {
        self.uid.store(uid, SeqCst);
        self.manager.store(true, SeqCst);
    }

    pub fn set_last_manager_appid(&self, appid: i32) {
        self.last_manager_appid.store(appid, SeqCst);
    }

    pub fn fail_audit(&self) {
        self.audit_fails.store(true, SeqCst);
    }

    pub fn syscall_records(&self) -> Vec<AuditRecord> {
        self.audit
            .lock()
            .iter()
            .filter(|r| matches!(r, AuditRecord::Syscall { .. }))
            .cloned()
            .collect()
    }

    // User memory

    /// Map a fresh region holding `bytes`.
    pub fn user_alloc(&self, bytes: &[u8]) -> UserPtr {
        let mut mem = self.memory.lock();
        let base = mem.next;
        mem.next = base + bytes.len().max(1) as u64 + USER_GAP;
        mem.regions.push(Region {
            base,
            bytes: bytes.to_vec(),
        });
        UserPtr::new(base)
    }

    pub fn user_put<T: Plain>(&self, value: &T) -> UserPtr {
        self.user_alloc(value.as_bytes())
    }

    pub fn user_get<T: Plain>(&self, ptr: UserPtr) -> T {
        copy_from_user(self, ptr).unwrap()
    }

    /// Map a NUL-terminated copy of `s`.
    pub fn user_str(&self, s: &str) -> UserPtr {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.user_alloc(&bytes)
    }

    // Descriptor table

    pub fn set_fd_limit(&self, limit: usize) {
        self.fds.lock().limit = limit;
    }

    pub fn fail_install_file(&self) {
        self.fail_install.store(true, SeqCst);
    }

    pub fn open_fds(&self) -> usize {
        self.fds.lock().files.len()
    }

    pub fn reserved_fds(&self) -> usize {
        self.fds.lock().reserved.len()
    }

    pub fn file_name(&self, fd: i32) -> Option<&'static str> {
        self.fds.lock().files.get(&fd).map(|(name, _)| *name)
    }

    /// Issue an ioctl on an installed descriptor.
    pub fn fd_ioctl(&self, fd: i32, cmd: u32, arg: UserPtr) -> Option<i64> {
        let file = self.fds.lock().files.get(&fd).map(|(_, f)| Arc::clone(f))?;
        Some(file.ioctl(cmd, arg))
    }

    /// Issue a 32-bit compat ioctl on an installed descriptor.
    pub fn fd_compat_ioctl(&self, fd: i32, cmd: u32, arg: UserPtr) -> Option<i64> {
        let file = self.fds.lock().files.get(&fd).map(|(_, f)| Arc::clone(f))?;
        Some(file.compat_ioctl(cmd, arg))
    }

    // Task work

    pub fn fail_task_work(&self) {
        self.task_work_fails.store(true, SeqCst);
    }

    pub fn pending_task_work(&self) -> usize {
        self.task_work.lock().len()
    }

    /// Resume the current task: run queued work in order.
    pub fn run_task_work(&self) -> usize {
        let work: Vec<DeferredWork> = core::mem::take(&mut *self.task_work.lock());
        let n = work.len();
        for w in work {
            w();
        }
        n
    }

    fn audit_record(&self, record: AuditRecord) -> Result<()> {
        if self.audit_fails.load(SeqCst) {
            return Err(SupercallError::Errno(-5));
        }
        self.audit.lock().push(record);
        Ok(())
    }
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}

impl CallerIdentity for TestHost {
    fn current_uid(&self) -> u32 {
        self.uid.load(SeqCst)
    }

    fn current_pid(&self) -> i32 {
        self.pid.load(SeqCst)
    }

    fn current_comm(&self) -> Comm {
        let mut comm = [0u8; 16];
        comm[..4].copy_from_slice(b"ksud");
        comm
    }

    fn is_manager(&self) -> bool {
        self.manager.load(SeqCst)
    }

    fn last_manager_appid(&self) -> i32 {
        self.last_manager_appid.load(SeqCst)
    }
}

impl UserAccess for TestHost {
    fn read_user(&self, src: UserPtr, dst: &mut [u8]) -> Result<()> {
        let mem = self.memory.lock();
        let region = mem.find(src.addr()).ok_or(SupercallError::CopyFault)?;
        let range = region
            .slice(src.addr(), dst.len())
            .ok_or(SupercallError::CopyFault)?;
        dst.copy_from_slice(&region.bytes[range]);
        Ok(())
    }

    fn write_user(&self, dst: UserPtr, src: &[u8]) -> Result<()> {
        let mut mem = self.memory.lock();
        let region = mem.find_mut(dst.addr()).ok_or(SupercallError::CopyFault)?;
        let range = region
            .slice(dst.addr(), src.len())
            .ok_or(SupercallError::CopyFault)?;
        region.bytes[range].copy_from_slice(src);
        Ok(())
    }

    fn read_user_str(&self, src: UserPtr, dst: &mut [u8]) -> Result<usize> {
        let mem = self.memory.lock();
        let region = mem.find(src.addr()).ok_or(SupercallError::CopyFault)?;
        let start = (src.addr() - region.base) as usize;
        let avail = &region.bytes[start..];
        for (i, slot) in dst.iter_mut().enumerate() {
            let b = *avail.get(i).ok_or(SupercallError::CopyFault)?;
            *slot = b;
            if b == 0 {
                return Ok(i);
            }
        }
        Ok(dst.len())
    }
}

impl RootPolicy for TestHost {
    fn is_allow_uid(&self, uid: u32) -> bool {
        self.allow.lock().contains(&uid)
    }

    fn allow_list(&self, allow: bool, out: &mut [u32]) -> Option<usize> {
        if self.fail_allow_list.load(SeqCst) {
            return None;
        }
        let list = if allow { self.allow.lock() } else { self.deny.lock() };
        let n = list.len().min(out.len());
        out[..n].copy_from_slice(&list[..n]);
        Some(n)
    }

    fn uid_should_umount(&self, uid: u32) -> bool {
        !self.allow.lock().contains(&uid)
    }

    fn get_app_profile(&self, profile: &mut AppProfile) -> bool {
        match self.profiles.lock().iter().find(|p| p.key == profile.key) {
            Some(found) => {
                *profile = *found;
                true
            }
            None => false,
        }
    }

    fn set_app_profile(&self, profile: &AppProfile) -> bool {
        if self.reject_profiles.load(SeqCst) {
            return false;
        }
        let mut profiles = self.profiles.lock();
        match profiles.iter_mut().find(|p| p.key == profile.key) {
            Some(slot) => *slot = *profile,
            None => profiles.push(*profile),
        }
        true
    }

    fn escape_with_root_profile(&self) {
        self.counters.escape_root.fetch_add(1, SeqCst);
    }

    fn is_safe_mode(&self) -> bool {
        self.safe_mode.load(SeqCst)
    }
}

impl Subsystems for TestHost {
    fn on_post_fs_data(&self) {
        self.counters.post_fs_data.fetch_add(1, SeqCst);
    }

    fn on_boot_completed(&self) {
        self.counters.boot_completed.fetch_add(1, SeqCst);
    }

    fn on_module_mounted(&self) {
        self.counters.module_mounted.fetch_add(1, SeqCst);
    }

    fn sulog_init(&self) {
        self.counters.sulog_init.fetch_add(1, SeqCst);
    }

    fn dynamic_manager_init(&self) {
        self.counters.dynamic_manager_init.fetch_add(1, SeqCst);
    }

    fn start_sdcard_monitor(&self) {
        self.counters.sdcard_monitor.fetch_add(1, SeqCst);
    }

    fn handle_sepolicy(&self, cmd: u64, arg: UserPtr) -> Result<i32> {
        self.sepolicy.lock().push((cmd, arg));
        Ok(0)
    }

    fn feature(&self, id: u32) -> FeatureState {
        if let Some(&e) = self.feature_errors.lock().get(&id) {
            return FeatureState::Failed(e);
        }
        match self.features.lock().get(&id) {
            Some(&value) => FeatureState::Value(value),
            None => FeatureState::Unsupported,
        }
    }

    fn set_feature(&self, id: u32, value: u64) -> Result<()> {
        if let Some(e) = *self.set_feature_error.lock() {
            return Err(e);
        }
        if id >= crate::config::KSU_FEATURE_MAX {
            return Err(SupercallError::BadArgument);
        }
        self.features.lock().insert(id, value);
        Ok(())
    }

    fn file_wrapper_available(&self) -> bool {
        self.wrapper.load(SeqCst)
    }

    fn install_file_wrapper(&self, fd: u32) -> Result<i32> {
        Ok(fd as i32 + 100)
    }

    fn manage_mark(&self, op: MarkOp) -> Result<u32> {
        let mut marked = self.marked.lock();
        Ok(match op {
            MarkOp::Get { pid } => marked.contains(&pid) as u32,
            MarkOp::Mark { pid } => {
                marked.insert(pid);
                0
            }
            MarkOp::Unmark { pid } => {
                marked.remove(&pid);
                0
            }
            MarkOp::Refresh => 0,
        })
    }

    fn nuke_ext4_sysfs(&self, mnt: &[u8]) -> Result<i32> {
        self.nuked.lock().push(mnt.to_vec());
        Ok(0)
    }

    fn handle_dynamic_manager(&self, cmd: &mut DynamicManagerCmd) -> Result<()> {
        let mut dynamic = self.dynamic.lock();
        match cmd.operation {
            dynamic_manager_op::SET => *dynamic = Some((cmd.size, cmd.hash)),
            dynamic_manager_op::GET => {
                let (size, hash) = (*dynamic).ok_or(SupercallError::NotFound)?;
                cmd.size = size;
                cmd.hash = hash;
            }
            dynamic_manager_op::CLEAR => *dynamic = None,
            _ => return Err(SupercallError::BadArgument),
        }
        Ok(())
    }

    fn get_managers(&self, cmd: &mut GetManagersCmd) -> Result<()> {
        let managers = self.managers.lock();
        let n = managers.len().min(cmd.managers.len());
        cmd.managers[..n].copy_from_slice(&managers[..n]);
        cmd.count = n as u16;
        Ok(())
    }
}

impl AuditSink for TestHost {
    fn report_permission_check(&self, uid: u32, _comm: &Comm, allowed: bool) -> Result<()> {
        self.audit_record(AuditRecord::Permission { uid, allowed })
    }

    fn report_syscall(&self, uid: u32, command: &'static str, outcome: AuditOutcome) -> Result<()> {
        self.audit_record(AuditRecord::Syscall {
            uid,
            command,
            outcome,
        })
    }

    fn report_manager_operation(&self, op: &'static str, uid: u32, target_uid: i32) -> Result<()> {
        self.audit_record(AuditRecord::ManagerOp {
            op,
            uid,
            target: target_uid,
        })
    }
}

impl TaskContext for TestHost {
    fn reserve_fd(&self) -> Result<i32> {
        let mut fds = self.fds.lock();
        if fds.files.len() + fds.reserved.len() >= fds.limit {
            return Err(SupercallError::ResourceExhausted);
        }
        let fd = (FIRST_FD..)
            .find(|&fd| !fds.in_use(fd))
            .ok_or(SupercallError::ResourceExhausted)?;
        fds.reserved.insert(fd);
        Ok(fd)
    }

    fn release_fd(&self, fd: i32) {
        self.fds.lock().reserved.remove(&fd);
    }

    fn install_file(&self, fd: i32, name: &'static str, file: Arc<dyn FileOps>) -> Result<()> {
        if self.fail_install.load(SeqCst) {
            return Err(SupercallError::ResourceExhausted);
        }
        let mut fds = self.fds.lock();
        if !fds.reserved.remove(&fd) {
            return Err(SupercallError::BadArgument);
        }
        fds.files.insert(fd, (name, file));
        Ok(())
    }

    fn close_fd(&self, fd: i32) {
        let removed = self.fds.lock().files.remove(&fd);
        if let Some((_, file)) = removed {
            file.release();
            self.counters.released.fetch_add(1, SeqCst);
        }
    }

    fn queue_task_work(&self, work: DeferredWork) -> Result<()> {
        if self.task_work_fails.load(SeqCst) {
            return Err(SupercallError::Errno(-3));
        }
        self.task_work.lock().push(work);
        Ok(())
    }
}

impl Extensions for TestHost {
    fn run_extension(&self, cmd: ExtensionCommand, arg: UserPtr) {
        self.extensions.lock().push((cmd, arg));
    }
}
