//! Error sites: one immutable record per annotated failure in the source.
//!
//! A site is created once, in a `static` table, and lives for the whole
//! process. Domains that want extra fields wrap the common [`ErrorSite`] in
//! their own record type:
//!
//! ```text
//! #[repr(C)]
//! struct AttrSite {             ┌──────────────────────────┐ offset 0
//!     site: ErrorSite,   ──────▶│ message owner file line  │
//!     attr_offset: u32,         │ code                     │
//!     attr_size: u32,           ├──────────────────────────┤
//! }                             │ domain-specific fields   │
//!                               └──────────────────────────┘
//! ```
//!
//! The registry walks a domain's table by byte stride, so it only ever needs
//! the `ErrorSite` prefix; the domain's formatter gets the full record back.

use crate::EXT_BASE;

/// The common part of every error site.
#[repr(C)]
#[derive(Debug, PartialEq, Eq)]
pub struct ErrorSite {
    pub message: &'static str,
    pub owner: &'static str,
    pub file: &'static str,
    pub line: u32,
    /// Plain narrow-channel code, e.g. `-EINVAL`.
    pub code: i32,
}

impl ErrorSite {
    /// Build a site. Fails const evaluation if `code` is not a plain
    /// negative code below [`EXT_BASE`].
    ///
    /// Prefer [`ext_site!`](crate::ext_site), which fills in owner and
    /// location.
    pub const fn new(
        message: &'static str,
        owner: &'static str,
        file: &'static str,
        line: u32,
        code: i32,
    ) -> Self {
        assert!(
            code < 0 && code > -(EXT_BASE as i32),
            "error site code must be a plain negative errno"
        );
        Self { message, owner, file, line, code }
    }

    /// Magnitude of the plain code.
    #[inline]
    pub const fn errno(&self) -> i32 {
        -self.code
    }
}

impl core::fmt::Display for ErrorSite {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {} ({}) at {}:{}", self.owner, self.message, self.code, self.file, self.line)
    }
}

/// A record type that can live in a domain's site table.
///
/// # Safety
///
/// The implementing type must be `#[repr(C)]` with an [`ErrorSite`] as its
/// first field, and `site()` must return that field. The registry reads the
/// prefix of each record through a raw byte offset and
/// [`from_site`](Self::from_site) casts back from the prefix to the record.
pub unsafe trait SiteRecord: Sync + 'static {
    fn site(&self) -> &ErrorSite;

    /// Recover the full record from its embedded site.
    ///
    /// # Safety
    ///
    /// `site` must be the prefix of a `Self` record, i.e. obtained from a
    /// table of `Self`.
    #[inline]
    unsafe fn from_site(site: &ErrorSite) -> &Self
    where
        Self: Sized,
    {
        &*(site as *const ErrorSite).cast::<Self>()
    }
}

unsafe impl SiteRecord for ErrorSite {
    #[inline]
    fn site(&self) -> &ErrorSite {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    struct Wide {
        site: ErrorSite,
        extra: u64,
    }

    unsafe impl SiteRecord for Wide {
        fn site(&self) -> &ErrorSite {
            &self.site
        }
    }

    static WIDE: Wide = Wide {
        site: ErrorSite::new("too wide", "test", "site.rs", 1, -libc::E2BIG),
        extra: 77,
    };

    #[test]
    fn errno_is_magnitude() {
        let site = ErrorSite::new("bad", "t", "f.rs", 3, -libc::EINVAL);
        assert_eq!(site.errno(), libc::EINVAL);
    }

    #[test]
    fn from_site_recovers_record() {
        let prefix = WIDE.site();
        let rec = unsafe { Wide::from_site(prefix) };
        assert_eq!(rec.extra, 77);
        assert!(core::ptr::eq(rec, &WIDE));
    }

    #[test]
    fn prefix_is_at_offset_zero() {
        let base = &WIDE as *const Wide as usize;
        let site = WIDE.site() as *const ErrorSite as usize;
        assert_eq!(base, site);
    }

    #[test]
    #[should_panic(expected = "plain negative errno")]
    fn positive_code_rejected() {
        let _ = ErrorSite::new("bad", "t", "f.rs", 1, 22);
    }

    #[test]
    #[should_panic(expected = "plain negative errno")]
    fn extended_range_code_rejected() {
        let _ = ErrorSite::new("bad", "t", "f.rs", 1, -(EXT_BASE as i32));
    }

    #[test]
    fn display_format() {
        let site = ErrorSite::new("bad flags", "alpha", "a.rs", 10, -22);
        assert_eq!(site.to_string(), "alpha: bad flags (-22) at a.rs:10");
    }
}
