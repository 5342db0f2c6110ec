//! # exterr: extended errno reporting
//!
//! Rich, per-call-site diagnostics behind the plain negative error codes
//! callers already handle.
//!
//! ## Design
//!
//! The narrow channel is `[-MAX_CODE, -1]`. Magnitudes below [`EXT_BASE`]
//! are ordinary errnos. The window `[EXT_BASE, MAX_CODE)` is carved up
//! between *error domains*: each domain owns a contiguous static table of
//! *error sites*, and the registry assigns every domain a disjoint range
//! whose length equals its table size. An extended code therefore names
//! one exact site:
//!
//! ```text
//!  -1 ............ -1023 │ -1024 -1025 -1026 │ -1027 ...      │ ... -4095
//!   plain errno          │ alpha[0..3]       │ attr[0..n]     │ free
//! ```
//!
//! - A call site returns `DOMAIN.report(&SITE)`: an extended code, computed
//!   from the site's position in its table. No lookup, no allocation.
//! - At the boundary, [`normalize`] replaces it with the site's plain code
//!   (e.g. `-EINVAL`) and parks the extended code in the calling thread's
//!   slot.
//! - An interested caller calls [`retrieve`] once to get a JSON payload with
//!   file, line, code, module, message and domain fields. The slot is
//!   cleared only when the copy succeeds.
//!
//! ## Quick Start
//!
//! ```rust
//! use exterr::{ext_site, error_domain, ErrorSite, RegistryConfig};
//!
//! static ALPHA_SITES: [ErrorSite; 2] = [
//!     ext_site!(owner = "alpha", -libc::EBADF, "missing handle"),
//!     ext_site!(owner = "alpha", -libc::EINVAL, "unknown flag bits"),
//! ];
//! error_domain!(ALPHA, "alpha", ALPHA_SITES);
//!
//! fn validate(flags: u32) -> i32 {
//!     if flags & !0x3 != 0 {
//!         return ALPHA.report(&ALPHA_SITES[1]);
//!     }
//!     0
//! }
//!
//! exterr::init_with(RegistryConfig::default(), [&ALPHA]).unwrap();
//!
//! let ret = exterr::normalize(validate(0x10));
//! assert_eq!(ret, -libc::EINVAL);
//!
//! let mut buf = [0u8; 256];
//! let n = exterr::retrieve(&mut buf).unwrap().unwrap();
//! let text = std::str::from_utf8(&buf[..n - 1]).unwrap();
//! assert!(text.contains("\"message\": \"unknown flag bits\""));
//! assert_eq!(exterr::retrieve(&mut buf).unwrap(), None);
//! ```
//!
//! ## Feature Flags
//!
//! | Flag      | Effect |
//! |-----------|--------|
//! | `metrics` | Per-site AtomicU64 counters, Prometheus dump |

mod config;
mod domain;
mod engine;
pub mod env;
mod error;
pub mod kprint;
#[macro_use]
mod macros;
pub mod payload;
mod registry;
pub mod site;
pub mod slot;
pub mod transport;

#[cfg(feature = "metrics")]
pub mod metrics;

// ── Public API ────────────────────────────────────────────────────

pub use config::RegistryConfig;
pub use domain::{DomainRange, DomainReg, ErrorDomain, FormatFn};
pub use error::{ExtError, ExtResult};
pub use kprint::{set_log_level, LogLevel};
pub use payload::FieldWriter;
pub use registry::{discover, global, init, init_with, Registry, Resolved, SkipReason, Skipped};
pub use site::{ErrorSite, SiteRecord};
pub use slot::DiagSlot;
pub use transport::{CopyOut, Fault};

#[doc(hidden)]
pub use inventory;

/// Magnitudes at or above this are extended codes.
pub const EXT_BASE: u32 = 1024;

/// Size of the narrow channel (`MAX_ERRNO`); no code reaches `-MAX_CODE`.
pub const MAX_CODE: u32 = 4095;

// ── Process-wide entry points ─────────────────────────────────────

/// Normalize `code` against the process-wide registry and the calling
/// thread's slot. Before [`init`], every code passes through.
#[inline]
pub fn normalize(code: i32) -> i32 {
    match global() {
        Some(reg) => reg.normalize(code),
        None => code,
    }
}

/// Retrieve the calling thread's pending diagnostic into `buf`.
///
/// `Ok(None)` when nothing is pending (or before [`init`]).
pub fn retrieve(buf: &mut [u8]) -> ExtResult<Option<usize>> {
    match global() {
        Some(reg) => reg.retrieve(buf),
        None => Ok(None),
    }
}

/// Retrieve through an arbitrary transport, at most `capacity` bytes.
pub fn retrieve_to<C>(out: &mut C, capacity: usize) -> ExtResult<Option<usize>>
where
    C: CopyOut + ?Sized,
{
    match global() {
        Some(reg) => reg.retrieve_to(out, capacity),
        None => Ok(None),
    }
}

/// [`retrieve`] folded back into the narrow channel: bytes written
/// (terminator included), `0` if nothing is pending, `-errno` on failure.
pub fn retrieve_errno(buf: &mut [u8]) -> i32 {
    match retrieve(buf) {
        Ok(Some(n)) => n as i32,
        Ok(None) => 0,
        Err(e) => -e.errno(),
    }
}

/// Extended magnitude pending for the calling thread.
#[inline]
pub fn pending() -> Option<u32> {
    slot::current_pending()
}

/// Drop the calling thread's pending diagnostic.
#[inline]
pub fn clear_pending() {
    slot::clear_current()
}
