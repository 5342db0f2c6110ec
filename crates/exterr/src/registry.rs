//! Domain registry: hands out disjoint ranges and maps magnitudes back to
//! domains.
//!
//! # Numeric layout
//!
//! ```text
//!  magnitude:  1 ........ ext_base-1 │ ext_base ............... max_code-1
//!              plain codes (errno)   │ extended: [alpha][beta]...[free]
//! ```
//!
//! Ranges are handed out in discovery order from a running counter that
//! starts at `ext_base`, and a magnitude is resolved with a bisection over
//! the entry list sorted by `first`.
//!
//! A domain keeps its range for the life of the process. Every range ever
//! handed out is recorded in a process-wide claim list, so a later registry
//! never gives the same magnitudes to another domain; a domain that already
//! owns a range inside the window is kept at that range.

use std::sync::{Mutex, OnceLock};

use crate::config::RegistryConfig;
use crate::domain::{DomainRange, DomainReg, ErrorDomain};
use crate::error::{ExtError, ExtResult};
use crate::site::ErrorSite;
use crate::{kdebug, kinfo, kwarn};

/// A magnitude resolved to its domain and site.
#[derive(Debug, Clone, Copy)]
pub struct Resolved {
    pub domain: &'static ErrorDomain,
    pub offset: usize,
    pub site: &'static ErrorSite,
}

impl Resolved {
    /// Extended code this resolution came from.
    pub fn code(&self) -> Option<i32> {
        self.domain.code_at(self.offset)
    }
}

/// Why a domain did not make it into a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The domain has no sites
    Empty,
    /// Listed twice, or already owns a range outside this registry's window
    AlreadyRegistered(DomainRange),
    /// Not enough room left in the extended window
    BudgetExhausted { needed: usize, remaining: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Skipped {
    pub name: &'static str,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    range: DomainRange,
    domain: &'static ErrorDomain,
}

/// Read-only table of registered domains, sorted by range.
#[derive(Debug)]
pub struct Registry {
    config: RegistryConfig,
    entries: Vec<Entry>,
    skipped: Vec<Skipped>,
    /// Next unassigned magnitude
    next: u32,
}

impl Registry {
    /// Assign ranges to `domains`, in iteration order.
    ///
    /// A domain that does not fit in the remaining budget is skipped with a
    /// warning; later, smaller domains may still fit. A domain that already
    /// owns a range from an earlier build keeps it, and new ranges never
    /// reuse magnitudes claimed by any earlier build.
    pub fn build<I>(config: RegistryConfig, domains: I) -> ExtResult<Self>
    where
        I: IntoIterator<Item = &'static ErrorDomain>,
    {
        config.validate()?;

        let mut reg = Self {
            config,
            entries: Vec::new(),
            skipped: Vec::new(),
            next: config.ext_base,
        };

        let mut claims = CLAIMS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        kinfo!("Extended error reporting domains:");
        for domain in domains {
            match reg.admit(domain, &mut claims) {
                Ok(range) => kinfo!("  \"{}\": {}", domain.name(), range),
                Err(reason) => {
                    match reason {
                        SkipReason::Empty => kdebug!("domain \"{}\" has no sites", domain.name()),
                        SkipReason::AlreadyRegistered(range) => kwarn!(
                            "domain \"{}\" already owns {}, skipped",
                            domain.name(),
                            range
                        ),
                        SkipReason::BudgetExhausted { needed, remaining } => kwarn!(
                            "domain \"{}\" needs {} codes, only {} left below {}, skipped",
                            domain.name(),
                            needed,
                            remaining,
                            reg.config.max_code
                        ),
                    }
                    reg.skipped.push(Skipped { name: domain.name(), reason });
                }
            }
        }
        drop(claims);

        reg.entries.sort_by_key(|e| e.range.first);
        Ok(reg)
    }

    fn admit(
        &mut self,
        domain: &'static ErrorDomain,
        claims: &mut Vec<DomainRange>,
    ) -> Result<DomainRange, SkipReason> {
        let size = domain.len();
        if size == 0 {
            return Err(SkipReason::Empty);
        }
        if let Some(range) = domain.range() {
            let listed = self.entries.iter().any(|e| core::ptr::eq(e.domain, domain));
            if listed || !self.in_window(range) {
                return Err(SkipReason::AlreadyRegistered(range));
            }
            self.entries.push(Entry { range, domain });
            return Ok(range);
        }

        let remaining = self.remaining();
        if size as u64 >= self.config.max_code as u64 {
            return Err(SkipReason::BudgetExhausted { needed: size, remaining });
        }
        let first = first_fit(claims, self.next, size as u32);
        if first as u64 + size as u64 >= self.config.max_code as u64 {
            return Err(SkipReason::BudgetExhausted { needed: size, remaining });
        }

        let range = DomainRange {
            first,
            last: first + size as u32 - 1,
        };
        domain.assign(range).map_err(SkipReason::AlreadyRegistered)?;
        claims.push(range);

        self.next = first + size as u32;
        self.entries.push(Entry { range, domain });
        Ok(range)
    }

    fn in_window(&self, range: DomainRange) -> bool {
        range.first >= self.config.ext_base && range.last < self.config.max_code
    }

    #[inline]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Next magnitude that would be handed out.
    #[inline]
    pub fn used(&self) -> u32 {
        self.next
    }

    /// Magnitudes still available to new domains.
    #[inline]
    pub fn remaining(&self) -> u32 {
        self.config.max_code.saturating_sub(self.next)
    }

    /// Registered domains with their ranges, in ascending order.
    pub fn domains(&self) -> impl Iterator<Item = (&'static ErrorDomain, DomainRange)> + '_ {
        self.entries.iter().map(|e| (e.domain, e.range))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Domains that were not admitted, with the reason.
    #[inline]
    pub fn skipped(&self) -> &[Skipped] {
        &self.skipped
    }

    /// Registered domain by name.
    pub fn domain(&self, name: &str) -> Option<&'static ErrorDomain> {
        self.entries.iter().find(|e| e.domain.name() == name).map(|e| e.domain)
    }

    /// True if `code` falls in the extended window of this registry.
    #[inline]
    pub fn is_extended(&self, code: i32) -> bool {
        let m = code.unsigned_abs();
        m >= self.config.ext_base && m < self.config.max_code
    }

    // ── Lookup ────────────────────────────────────────────────────

    fn find(&self, magnitude: u32) -> Option<&Entry> {
        if magnitude < self.config.ext_base {
            return None;
        }
        match self.entries.last() {
            Some(last) if magnitude <= last.range.last => {}
            _ => return None,
        }

        let (mut lo, mut hi) = (0usize, self.entries.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = &self.entries[mid];
            if magnitude < entry.range.first {
                hi = mid;
            } else if magnitude > entry.range.last {
                lo = mid + 1;
            } else {
                return Some(entry);
            }
        }
        None
    }

    /// The domain owning `magnitude`.
    #[inline]
    pub fn find_domain(&self, magnitude: u32) -> Option<&'static ErrorDomain> {
        self.find(magnitude).map(|e| e.domain)
    }

    /// Resolve an extended magnitude to its domain and site.
    ///
    /// Zero, plain magnitudes, gaps and anything past the last domain give
    /// `None`.
    pub fn resolve(&self, magnitude: u32) -> Option<Resolved> {
        if magnitude == 0 {
            return None;
        }
        let entry = self.find(magnitude)?;
        let offset = (magnitude - entry.range.first) as usize;
        let site = entry.domain.site(offset)?;
        Some(Resolved { domain: entry.domain, offset, site })
    }

    /// [`resolve`](Self::resolve) for a signed code.
    #[inline]
    pub fn resolve_code(&self, code: i32) -> Option<Resolved> {
        self.resolve(code.unsigned_abs())
    }

    /// Extended code for `offset` in `domain`, if the domain is registered
    /// here and the offset exists.
    pub fn encode(&self, domain: &ErrorDomain, offset: usize) -> Option<i32> {
        let range = domain.range()?;
        let entry = self.find(range.first)?;
        if !core::ptr::eq(entry.domain, domain) {
            return None;
        }
        domain.code_at(offset)
    }
}

// ── Process-wide registry ─────────────────────────────────────────

static GLOBAL: OnceLock<Registry> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Every range handed out by any registry in this process.
static CLAIMS: Mutex<Vec<DomainRange>> = Mutex::new(Vec::new());

/// Lowest start at or after `from` where `size` magnitudes clear every claim.
fn first_fit(claims: &[DomainRange], from: u32, size: u32) -> u32 {
    let mut first = from;
    loop {
        let want = DomainRange { first, last: first + size - 1 };
        match claims.iter().find(|c| c.overlaps(&want)) {
            Some(c) => first = c.last + 1,
            None => return first,
        }
    }
}

/// All domains submitted with [`register_domain!`](crate::register_domain),
/// sorted by name so range assignment does not depend on link order.
pub fn discover() -> Vec<&'static ErrorDomain> {
    let mut domains = Vec::new();
    for reg in inventory::iter::<DomainReg> {
        domains.push(reg.0);
    }
    domains.sort_by_key(|d| d.name());
    domains
}

/// Build the process-wide registry from discovered domains and the
/// environment. Must run before any domain reports.
pub fn init() -> ExtResult<&'static Registry> {
    init_with(RegistryConfig::from_env(), discover())
}

/// Build the process-wide registry from an explicit list.
pub fn init_with<I>(config: RegistryConfig, domains: I) -> ExtResult<&'static Registry>
where
    I: IntoIterator<Item = &'static ErrorDomain>,
{
    let _guard = INIT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if GLOBAL.get().is_some() {
        return Err(ExtError::AlreadyInitialized);
    }
    let registry = Registry::build(config, domains)?;
    Ok(GLOBAL.get_or_init(|| registry))
}

/// The process-wide registry, once initialized.
#[inline]
pub fn global() -> Option<&'static Registry> {
    GLOBAL.get()
}
