//! Error domains: named, independently declared tables of error sites.
//!
//! A domain owns a contiguous `'static` table of site records plus an
//! optional formatter for its extra fields. Its numeric range is left
//! unassigned until the registry is built; from then on it never changes.

use core::fmt;
use core::mem;
use std::sync::OnceLock;

use crate::payload::FieldWriter;
use crate::site::{ErrorSite, SiteRecord};

/// Renders a domain's extra fields for one of its sites.
///
/// The site is always the prefix of a record from this domain's table, so a
/// formatter may recover the record with [`SiteRecord::from_site`].
pub type FormatFn = fn(&ErrorSite, &mut FieldWriter<'_>) -> fmt::Result;

/// Inclusive range of extended magnitudes owned by one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainRange {
    pub first: u32,
    pub last: u32,
}

impl DomainRange {
    #[inline]
    pub const fn contains(&self, magnitude: u32) -> bool {
        magnitude >= self.first && magnitude <= self.last
    }

    #[inline]
    pub const fn len(&self) -> u32 {
        self.last - self.first + 1
    }

    #[inline]
    pub const fn overlaps(&self, other: &DomainRange) -> bool {
        self.first <= other.last && other.first <= self.last
    }
}

impl fmt::Display for DomainRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-{}..-{}", self.first, self.last)
    }
}

/// An error domain descriptor.
///
/// Declare one per subsystem with [`error_domain!`](crate::error_domain) or
/// the const constructors, in a `static`.
pub struct ErrorDomain {
    name: &'static str,
    /// Start of the site table
    base: *const u8,
    /// Number of records
    len: usize,
    /// Size of one record in bytes
    stride: usize,
    format: Option<FormatFn>,
    range: OnceLock<DomainRange>,
}

// ErrorDomain is Send + Sync:
// - `base` points into a `'static` table of `SiteRecord`s, which are Sync
//   and never mutated
// - `range` is a OnceLock
unsafe impl Send for ErrorDomain {}
unsafe impl Sync for ErrorDomain {}

impl ErrorDomain {
    /// A domain without extra fields.
    pub const fn new<T: SiteRecord>(name: &'static str, sites: &'static [T]) -> Self {
        Self::build(name, sites, None)
    }

    /// A domain whose payloads carry extra fields rendered by `format`.
    pub const fn with_format<T: SiteRecord>(
        name: &'static str,
        sites: &'static [T],
        format: FormatFn,
    ) -> Self {
        Self::build(name, sites, Some(format))
    }

    const fn build<T: SiteRecord>(
        name: &'static str,
        sites: &'static [T],
        format: Option<FormatFn>,
    ) -> Self {
        Self {
            name,
            base: sites.as_ptr().cast::<u8>(),
            len: sites.len(),
            stride: mem::size_of::<T>(),
            format,
            range: OnceLock::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of sites in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size in bytes of one site record.
    #[inline]
    pub fn record_size(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn has_format(&self) -> bool {
        self.format.is_some()
    }

    /// Assigned range, or `None` before registration.
    #[inline]
    pub fn range(&self) -> Option<DomainRange> {
        self.range.get().copied()
    }

    /// Assign the range. Fails with the existing range if one is set.
    pub(crate) fn assign(&self, range: DomainRange) -> Result<(), DomainRange> {
        debug_assert_eq!(range.len() as usize, self.len);
        self.range.set(range).map_err(|_| self.range.get().copied().unwrap_or(range))
    }

    /// The site at `offset` within the table.
    #[inline]
    pub fn site(&self, offset: usize) -> Option<&'static ErrorSite> {
        if offset >= self.len {
            return None;
        }
        // SAFETY: offset is in bounds of a 'static table whose records are
        // `#[repr(C)]` with an ErrorSite prefix (SiteRecord contract).
        unsafe { Some(&*self.base.add(offset * self.stride).cast::<ErrorSite>()) }
    }

    /// All sites, in table order.
    pub fn sites(&self) -> impl Iterator<Item = &'static ErrorSite> + '_ {
        (0..self.len).filter_map(move |i| self.site(i))
    }

    /// Offset of `record` within this domain's table, if it belongs here.
    pub fn offset_of<T: SiteRecord>(&self, record: &T) -> Option<usize> {
        if mem::size_of::<T>() != self.stride {
            return None;
        }
        let addr = record as *const T as usize;
        let base = self.base as usize;
        let delta = addr.checked_sub(base)?;
        if delta % self.stride != 0 {
            return None;
        }
        let offset = delta / self.stride;
        (offset < self.len).then_some(offset)
    }

    /// Offset of a site prefix within this domain's table.
    #[inline]
    pub fn offset_of_site(&self, site: &ErrorSite) -> Option<usize> {
        let addr = site as *const ErrorSite as usize;
        let delta = addr.checked_sub(self.base as usize)?;
        if delta % self.stride != 0 {
            return None;
        }
        let offset = delta / self.stride;
        (offset < self.len).then_some(offset)
    }

    /// Extended code for the site at `offset`, once the range is assigned.
    #[inline]
    pub fn code_at(&self, offset: usize) -> Option<i32> {
        let range = self.range.get()?;
        if offset >= self.len {
            return None;
        }
        Some(-((range.first + offset as u32) as i32))
    }

    /// Report a failure at `record`: the extended code for that site.
    ///
    /// No lookup, no allocation. If the domain has not been registered yet,
    /// or `record` is not part of this domain's table, the site's plain code
    /// is returned so the caller still gets a meaningful errno.
    ///
    /// `record` may also be the embedded [`ErrorSite`] of a larger record.
    #[inline]
    pub fn report<T: SiteRecord>(&self, record: &T) -> i32 {
        let offset = self
            .offset_of(record)
            .or_else(|| self.offset_of_site(record.site()));
        match offset.and_then(|off| self.code_at(off)) {
            Some(code) => code,
            None => record.site().code,
        }
    }

    /// Run the domain formatter, if any, for `site`.
    pub(crate) fn format_extra(&self, site: &ErrorSite, out: &mut FieldWriter<'_>) -> fmt::Result {
        match self.format {
            Some(format) => format(site, out),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ErrorDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ErrorDomain");
        d.field("name", &self.name);
        d.field("sites", &self.len);
        d.field("record_size", &self.stride);
        d.field("format", &self.format.is_some());
        if let Some(range) = self.range.get() {
            d.field("range", range);
        }
        d.finish()
    }
}

// ── Discovery ─────────────────────────────────────────────────────

/// Discovery entry submitted by [`register_domain!`](crate::register_domain).
pub struct DomainReg(pub &'static ErrorDomain);

inventory::collect!(DomainReg);
