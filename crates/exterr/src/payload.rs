//! Diagnostic payload rendering.
//!
//! The payload is a small JSON object with a fixed field order:
//!
//! ```text
//! {
//!     "file": "src/attr.rs",
//!     "line": 42,
//!     "code": -22,
//!     "module": "attr",
//!     "message": "unknown attribute flags",
//!     "attr_offset": 8            ◀── domain extras, if any
//! }
//! ```
//!
//! Every value goes through `serde_json`, so messages with quotes or control
//! characters and whatever a domain formatter emits stay well-formed.

use core::fmt;

use serde::Serialize;

use crate::domain::ErrorDomain;
use crate::error::{ExtError, ExtResult};
use crate::site::ErrorSite;

/// Headroom reserved up front for the fixed part of the payload.
const FIXED_OVERHEAD: usize = 96;

/// Appends `"name": value` fields to a payload under construction.
///
/// Handed to domain formatters; each call emits one well-formed field.
pub struct FieldWriter<'a> {
    out: &'a mut String,
    fields: usize,
}

impl<'a> FieldWriter<'a> {
    fn new(out: &'a mut String) -> Self {
        Self { out, fields: 0 }
    }

    /// Emit one field. Fails if `value` cannot be serialized.
    pub fn field<V>(&mut self, name: &str, value: &V) -> fmt::Result
    where
        V: Serialize + ?Sized,
    {
        let key = serde_json::to_string(name).map_err(|_| fmt::Error)?;
        let value = serde_json::to_string(value).map_err(|_| fmt::Error)?;
        if self.fields > 0 {
            self.out.push(',');
        }
        self.out.push_str("\n\t");
        self.out.push_str(&key);
        self.out.push_str(": ");
        self.out.push_str(&value);
        self.fields += 1;
        Ok(())
    }

    /// Number of fields written so far.
    #[inline]
    pub fn count(&self) -> usize {
        self.fields
    }
}

/// Render the full payload for `site` of `domain`.
pub fn render(domain: &ErrorDomain, site: &ErrorSite) -> ExtResult<String> {
    let mut out = String::new();
    out.try_reserve(FIXED_OVERHEAD + site.message.len() + site.file.len() + site.owner.len())
        .map_err(|_| ExtError::NoMemory)?;

    out.push('{');
    let mut w = FieldWriter::new(&mut out);
    write_fixed(&mut w, site).map_err(|_| ExtError::NoMemory)?;

    domain
        .format_extra(site, &mut w)
        .map_err(|_| ExtError::FormatFailed { domain: domain.name() })?;

    out.push_str("\n}\n");
    Ok(out)
}

fn write_fixed(w: &mut FieldWriter<'_>, site: &ErrorSite) -> fmt::Result {
    w.field("file", site.file)?;
    w.field("line", &site.line)?;
    w.field("code", &site.code)?;
    w.field("module", site.owner)?;
    w.field("message", site.message)
}

/// Cut `payload` to fit `capacity` bytes including a trailing NUL.
///
/// Returns the bytes to deliver. `capacity` must be non-zero.
pub fn terminate(mut payload: Vec<u8>, capacity: usize) -> Vec<u8> {
    debug_assert!(capacity > 0);
    let keep = payload.len().min(capacity.saturating_sub(1));
    payload.truncate(keep);
    payload.push(0);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::SiteRecord;

    static PLAIN: [ErrorSite; 1] =
        [ErrorSite::new("bad \"flags\"", "alpha", "src/alpha.rs", 7, -libc::EINVAL)];

    #[repr(C)]
    struct SizedSite {
        site: ErrorSite,
        size: u32,
        name: &'static str,
    }

    unsafe impl SiteRecord for SizedSite {
        fn site(&self) -> &ErrorSite {
            &self.site
        }
    }

    static SIZED: [SizedSite; 1] = [SizedSite {
        site: ErrorSite::new("too big", "beta", "src/beta.rs", 9, -libc::E2BIG),
        size: 4096,
        name: "ring",
    }];

    fn fmt_sized(site: &ErrorSite, out: &mut FieldWriter<'_>) -> fmt::Result {
        let rec = unsafe { SizedSite::from_site(site) };
        out.field("size", &rec.size)?;
        out.field("object", rec.name)
    }

    fn fmt_broken(_: &ErrorSite, _: &mut FieldWriter<'_>) -> fmt::Result {
        Err(fmt::Error)
    }

    #[test]
    fn plain_payload_fields_in_order() {
        let dom = ErrorDomain::new("alpha", &PLAIN);
        let text = render(&dom, &PLAIN[0]).unwrap();

        let file = text.find("\"file\"").unwrap();
        let line = text.find("\"line\"").unwrap();
        let code = text.find("\"code\"").unwrap();
        let module = text.find("\"module\"").unwrap();
        let message = text.find("\"message\"").unwrap();
        assert!(file < line && line < code && code < module && module < message);

        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["file"], "src/alpha.rs");
        assert_eq!(v["line"], 7);
        assert_eq!(v["code"], -22);
        assert_eq!(v["module"], "alpha");
        assert_eq!(v["message"], "bad \"flags\"");
        assert_eq!(v.as_object().unwrap().len(), 5);
    }

    #[test]
    fn layout_matches_classic_format() {
        let dom = ErrorDomain::new("alpha", &PLAIN);
        let text = render(&dom, &PLAIN[0]).unwrap();
        assert!(text.starts_with("{\n\t\"file\": \"src/alpha.rs\",\n\t\"line\": 7,\n"));
        assert!(text.ends_with("\"message\": \"bad \\\"flags\\\"\"\n}\n"));
    }

    #[test]
    fn extras_follow_fixed_fields() {
        let dom = ErrorDomain::with_format("beta", &SIZED, fmt_sized);
        let text = render(&dom, SIZED[0].site()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["size"], 4096);
        assert_eq!(v["object"], "ring");
        assert!(text.find("\"message\"").unwrap() < text.find("\"size\"").unwrap());
    }

    #[test]
    fn formatter_failure_names_domain() {
        let dom = ErrorDomain::with_format("beta", &SIZED, fmt_broken);
        let err = render(&dom, SIZED[0].site()).unwrap_err();
        assert_eq!(err, ExtError::FormatFailed { domain: "beta" });
    }

    #[test]
    fn terminate_short_payload() {
        let out = terminate(b"abc".to_vec(), 16);
        assert_eq!(out, b"abc\0");
    }

    #[test]
    fn terminate_truncates_to_capacity() {
        let out = terminate(b"abcdef".to_vec(), 4);
        assert_eq!(out, b"abc\0");
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn terminate_exact_fit() {
        // len == capacity still loses one byte to the terminator
        let out = terminate(b"abcd".to_vec(), 4);
        assert_eq!(out, b"abc\0");
        let out = terminate(b"abcd".to_vec(), 5);
        assert_eq!(out, b"abcd\0");
    }

    #[test]
    fn terminate_capacity_one() {
        assert_eq!(terminate(b"abc".to_vec(), 1), b"\0");
    }
}
