//! Per-site normalization counters.
//!
//! Enabled with `feature = "metrics"`. Every successful
//! [`normalize`](crate::Registry::normalize_in) costs one
//! `AtomicU64::fetch_add(1, Relaxed)` on the counter of the extended
//! magnitude.
//!
//! ```text
//! normalize(-1025)
//!       │
//!       ▼  index = |code|
//! COUNTERS[1025].fetch_add(1, Relaxed)
//!       │
//!       ▼  dump(&registry) → domain "alpha", offset 1, message, count
//! ```

use core::sync::atomic::{AtomicU64, Ordering};
use std::fmt::Write;

use crate::registry::Registry;
use crate::MAX_CODE;

/// One counter per magnitude. `RegistryConfig::validate` keeps every
/// window at or below `MAX_CODE`, so no hit falls outside the table.
pub const MAX_SITES: usize = MAX_CODE as usize;

static COUNTERS: [AtomicU64; MAX_SITES] = {
    const ZERO: AtomicU64 = AtomicU64::new(0);
    [ZERO; MAX_SITES]
};

/// Count one hit on `magnitude`. Returns the previous count.
#[inline(always)]
pub fn bump(magnitude: u32) -> u64 {
    match COUNTERS.get(magnitude as usize) {
        Some(c) if magnitude > 0 => c.fetch_add(1, Ordering::Relaxed),
        _ => 0,
    }
}

/// Current count for `magnitude`.
#[inline]
pub fn count(magnitude: u32) -> u64 {
    COUNTERS.get(magnitude as usize).map_or(0, |c| c.load(Ordering::Relaxed))
}

/// Reset one counter, returning the old value.
#[inline]
pub fn reset(magnitude: u32) -> u64 {
    COUNTERS.get(magnitude as usize).map_or(0, |c| c.swap(0, Ordering::Relaxed))
}

pub fn reset_all() {
    for counter in COUNTERS.iter() {
        counter.store(0, Ordering::Relaxed);
    }
}

/// A non-zero counter with its site.
#[derive(Debug, Clone)]
pub struct SiteSnapshot {
    pub magnitude: u32,
    pub domain: &'static str,
    pub offset: usize,
    pub message: &'static str,
    pub code: i32,
    pub count: u64,
}

/// All non-zero counters of sites registered in `registry`.
pub fn dump(registry: &Registry) -> Vec<SiteSnapshot> {
    let mut out = Vec::new();
    for (domain, range) in registry.domains() {
        for magnitude in range.first..=range.last {
            let count = count(magnitude);
            if count == 0 {
                continue;
            }
            if let Some(hit) = registry.resolve(magnitude) {
                out.push(SiteSnapshot {
                    magnitude,
                    domain: domain.name(),
                    offset: hit.offset,
                    message: hit.site.message,
                    code: hit.site.code,
                    count,
                });
            }
        }
    }
    out
}

/// Counters in Prometheus exposition format.
pub fn dump_prometheus(registry: &Registry) -> String {
    let mut out = String::from(
        "# HELP exterr_total Per-site extended error counter\n\
         # TYPE exterr_total counter\n",
    );
    for snap in dump(registry) {
        let _ = writeln!(
            out,
            "exterr_total{{domain=\"{}\",site=\"{}\",code=\"{}\",message=\"{}\"}} {}",
            snap.domain,
            snap.offset,
            snap.code,
            label_escape(snap.message),
            snap.count
        );
    }
    out
}

fn label_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}
