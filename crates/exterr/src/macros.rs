/// Build an [`ErrorSite`](crate::ErrorSite) for the current source location.
///
/// The owner defaults to `module_path!()`.
///
/// ```ignore
/// static SITES: [ErrorSite; 2] = [
///     ext_site!(-libc::EINVAL, "unknown flag bits"),
///     ext_site!(owner = "alpha", -libc::EBUSY, "object busy"),
/// ];
/// ```
///
/// `code` must be a plain negative errno; anything else fails to compile
/// when used in a `static`.
#[macro_export]
macro_rules! ext_site {
    (owner = $owner:expr, $code:expr, $msg:expr $(,)?) => {
        $crate::ErrorSite::new($msg, $owner, file!(), line!(), $code)
    };
    ($code:expr, $msg:expr $(,)?) => {
        $crate::ErrorSite::new($msg, module_path!(), file!(), line!(), $code)
    };
}

/// Declare an error domain over a static site table.
///
/// # Forms
///
/// ```ignore
/// // Plain sites, no extra fields:
/// error_domain!(pub ALPHA, "alpha", ALPHA_SITES);
///
/// // Domain-specific records with a typed formatter:
/// error_domain!(pub ATTR, "attr", ATTR_SITES: AttrSite, format = format_attr);
///
/// fn format_attr(rec: &AttrSite, out: &mut FieldWriter<'_>) -> core::fmt::Result {
///     out.field("attr_offset", &rec.offset)
/// }
/// ```
///
/// Declaring does not register. Pass the domain to
/// [`init_with`](crate::init_with) or submit it with
/// [`register_domain!`](crate::register_domain).
#[macro_export]
macro_rules! error_domain {
    ($(#[$meta:meta])* $vis:vis $name:ident, $dom:expr, $sites:path : $rec:ty, format = $fmt:path $(,)?) => {
        $(#[$meta])*
        $vis static $name: $crate::ErrorDomain = $crate::ErrorDomain::with_format($dom, &$sites, {
            fn __format(
                site: &$crate::ErrorSite,
                out: &mut $crate::FieldWriter<'_>,
            ) -> ::core::fmt::Result {
                // SAFETY: the registry only hands this domain sites from its
                // own table, which holds `$rec` records.
                let record = unsafe { <$rec as $crate::SiteRecord>::from_site(site) };
                $fmt(record, out)
            }
            __format
        });
    };
    ($(#[$meta:meta])* $vis:vis $name:ident, $dom:expr, $sites:path $(,)?) => {
        $(#[$meta])*
        $vis static $name: $crate::ErrorDomain = $crate::ErrorDomain::new($dom, &$sites);
    };
}

/// Submit domains for discovery by [`init`](crate::init).
///
/// ```ignore
/// register_domain!(ALPHA, ATTR);
/// ```
#[macro_export]
macro_rules! register_domain {
    ($($domain:path),+ $(,)?) => {
        $(
            $crate::inventory::submit! { $crate::DomainReg(&$domain) }
        )+
    };
}
