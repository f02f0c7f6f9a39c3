//! supercalls - Root-Manager Control Plane
//!
//! The privileged request surface a kernel-resident root manager exposes to
//! user space.
//!
//! # Components
//! - Command table and dispatcher with per-command permission predicates
//! - Mount registry of paths to try-unmount, deduplicated by path
//! - One-shot boot lifecycle latches
//! - Reboot side channel: deferred driver descriptor install and the
//!   extension command namespace
//!
//! # Host Integration
//! The crate never touches kernel internals. The embedding kernel implements
//! the traits in [`host`], hands an instance to [`init`], and forwards
//! ioctls on the driver descriptor and reboot calls to the returned
//! [`Supercalls`].
//!
//! # Cargo Features
//! - `sulog`: audit records for permission checks and dispatch outcomes
//! - `susfs`: extension command namespace and the sdcard monitor
//! - `manual-hook`: report manual syscall hooks

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod mount;
pub mod sidechannel;
pub mod supercall;
pub mod uapi;
pub mod user;

#[cfg(test)]
mod testing;

use alloc::sync::Arc;

use log::info;

pub use config::Config;
pub use error::{Result, SupercallError};
pub use host::Host;
pub use sidechannel::RebootVerdict;
pub use supercall::Supercalls;
pub use user::UserPtr;

static SUPERCALLS: spin::Once<Arc<Supercalls>> = spin::Once::new();

/// Bring up the control plane with `host`.
///
/// Only the first call takes effect; later calls return the existing
/// instance and drop their host.
pub fn init(host: Arc<dyn Host>) -> &'static Arc<Supercalls> {
    SUPERCALLS.call_once(|| {
        let sc = Arc::new(Supercalls::new(host));
        sc.log_commands();
        info!("supercalls initialized, version {}", sc.config().version_full);
        sc
    })
}

/// The control plane, once [`init`] ran.
pub fn get() -> Option<&'static Arc<Supercalls>> {
    SUPERCALLS.get()
}
