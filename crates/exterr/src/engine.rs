//! Narrow-channel boundary: normalization and one-shot retrieval.
//!
//! ```text
//!  call site            boundary                       caller
//!  ─────────            ────────                       ──────
//!  ATTR.report(&S[1])   normalize(-1025)
//!    → -1025              slot := 1025, → -EINVAL  ──▶  sees -22
//!                                                      retrieve(buf)
//!                        render, truncate, copy   ──▶  payload
//!                        slot := none (on success)
//! ```

use crate::error::{ExtError, ExtResult};
use crate::payload;
use crate::registry::Registry;
use crate::slot::{self, DiagSlot};
use crate::transport::CopyOut;

impl Registry {
    /// Turn a possibly extended code into the plain code callers expect,
    /// remembering the extended one in `slot`.
    ///
    /// Successful returns, plain codes and codes that do not resolve pass
    /// through unchanged. Never blocks or allocates.
    pub fn normalize_in(&self, slot: &DiagSlot, code: i32) -> i32 {
        if code > -(self.config().ext_base as i32) {
            return code;
        }
        let magnitude = code.unsigned_abs();
        let Some(hit) = self.resolve(magnitude) else {
            return code;
        };

        slot.set(magnitude);

        #[cfg(feature = "metrics")]
        crate::metrics::bump(magnitude);

        hit.site.code
    }

    /// [`normalize_in`](Self::normalize_in) with the current thread's slot.
    #[inline]
    pub fn normalize(&self, code: i32) -> i32 {
        slot::with_current(|s| self.normalize_in(s, code))
    }

    /// Render the diagnostic pending in `slot` and hand it to `out`.
    ///
    /// Returns `Ok(None)` when nothing is pending, `Ok(Some(n))` with the
    /// number of bytes delivered (terminator included, never more than
    /// `capacity`). The slot is cleared only after `out` accepted the bytes;
    /// on any error it is left as is.
    pub fn retrieve_in<C>(&self, slot: &DiagSlot, out: &mut C, capacity: usize) -> ExtResult<Option<usize>>
    where
        C: CopyOut + ?Sized,
    {
        let Some(magnitude) = slot.get() else {
            return Ok(None);
        };
        if capacity == 0 {
            return Err(ExtError::BufferTooSmall);
        }
        let Some(hit) = self.resolve(magnitude) else {
            // Left over from a different registry; nothing to say about it.
            slot.clear();
            return Ok(None);
        };

        let text = payload::render(hit.domain, hit.site)?;
        let bytes = payload::terminate(text.into_bytes(), capacity);

        out.copy_out(&bytes)?;
        slot.clear();
        Ok(Some(bytes.len()))
    }

    /// [`retrieve_in`](Self::retrieve_in) with the current thread's slot.
    #[inline]
    pub fn retrieve_to<C>(&self, out: &mut C, capacity: usize) -> ExtResult<Option<usize>>
    where
        C: CopyOut + ?Sized,
    {
        slot::with_current(|s| self.retrieve_in(s, out, capacity))
    }

    /// Retrieve into a slice, using its length as the capacity.
    #[inline]
    pub fn retrieve(&self, buf: &mut [u8]) -> ExtResult<Option<usize>> {
        let capacity = buf.len();
        self.retrieve_to(buf, capacity)
    }
}

#[cfg(test)]
mod tests {
    use core::fmt;

    use super::*;
    use crate::config::RegistryConfig;
    use crate::domain::ErrorDomain;
    use crate::kprint::{set_log_level, LogLevel};
    use crate::payload::FieldWriter;
    use crate::site::ErrorSite;
    use crate::transport::Fault;
    use crate::EXT_BASE;

    static ALPHA_SITES: [ErrorSite; 3] = [
        ErrorSite::new("missing handle", "alpha", "src/alpha.rs", 10, -libc::EBADF),
        ErrorSite::new("unknown flag bits", "alpha", "src/alpha.rs", 20, -libc::EINVAL),
        ErrorSite::new("object busy", "alpha", "src/alpha.rs", 30, -libc::EBUSY),
    ];

    fn alpha() -> &'static ErrorDomain {
        Box::leak(Box::new(ErrorDomain::new("alpha", &ALPHA_SITES)))
    }

    // Tests build registries in parallel, so exact magnitudes depend on
    // what was claimed first; assertions go through the assigned range.
    fn alpha_registry() -> (Registry, &'static ErrorDomain) {
        set_log_level(LogLevel::Off);
        let dom = alpha();
        let reg = Registry::build(RegistryConfig::default(), [dom]).unwrap();
        (reg, dom)
    }

    struct Refuse;

    impl CopyOut for Refuse {
        fn copy_out(&mut self, _: &[u8]) -> Result<(), Fault> {
            Err(Fault::new())
        }
    }

    #[test]
    fn alpha_scenario() {
        let (reg, dom) = alpha_registry();
        let slot = DiagSlot::new();

        let code = dom.report(&ALPHA_SITES[1]);
        assert_eq!(code, dom.code_at(1).unwrap());
        let magnitude = code.unsigned_abs();
        assert!(magnitude > EXT_BASE);

        assert_eq!(reg.normalize_in(&slot, code), -22);
        assert_eq!(slot.get(), Some(magnitude));

        let mut buf = [0u8; 64];
        let n = reg.retrieve_in(&slot, &mut buf[..], 64).unwrap().unwrap();
        assert!(n <= 64);
        assert_eq!(buf[n - 1], 0);
        let text = std::str::from_utf8(&buf[..n - 1]).unwrap();
        assert!(text.starts_with("{\n\t\"file\": \"src/alpha.rs\""));
        assert_eq!(text.len(), 63);
        assert!(!slot.is_pending());

        assert_eq!(reg.retrieve_in(&slot, &mut buf[..], 64).unwrap(), None);
    }

    #[test]
    fn full_payload_with_room() {
        let (reg, dom) = alpha_registry();
        let slot = DiagSlot::new();
        reg.normalize_in(&slot, dom.report(&ALPHA_SITES[1]));

        let mut out = Vec::new();
        let n = reg.retrieve_in(&slot, &mut out, 4096).unwrap().unwrap();
        assert_eq!(n, out.len());
        assert_eq!(out.last(), Some(&0));

        let v: serde_json::Value = serde_json::from_slice(&out[..n - 1]).unwrap();
        assert_eq!(v["file"], "src/alpha.rs");
        assert_eq!(v["line"], 20);
        assert_eq!(v["code"], -22);
        assert_eq!(v["module"], "alpha");
        assert_eq!(v["message"], "unknown flag bits");
        assert_eq!(v.as_object().unwrap().len(), 5);
    }

    #[test]
    fn plain_codes_pass_through() {
        let (reg, _) = alpha_registry();
        let slot = DiagSlot::new();
        for code in [-1, -22, -1023, 0, 5] {
            assert_eq!(reg.normalize_in(&slot, code), code);
            assert_eq!(reg.normalize_in(&slot, reg.normalize_in(&slot, code)), code);
        }
        assert!(!slot.is_pending());
    }

    #[test]
    fn successful_returns_pass_through() {
        let (reg, dom) = alpha_registry();
        let slot = DiagSlot::new();
        let r = dom.range().unwrap();
        let positives = [
            EXT_BASE as i32,
            r.first as i32,
            r.first as i32 + 1,
            r.last as i32,
            crate::MAX_CODE as i32,
            i32::MAX,
        ];
        for code in positives {
            assert_eq!(reg.normalize_in(&slot, code), code);
        }
        assert!(!slot.is_pending());

        // A real failure is still picked up afterwards.
        assert_eq!(reg.normalize_in(&slot, dom.report(&ALPHA_SITES[0])), -libc::EBADF);
        assert_eq!(slot.get(), Some(r.first));
    }

    #[test]
    fn unresolvable_extended_codes_pass_through() {
        let (reg, dom) = alpha_registry();
        let slot = DiagSlot::new();
        let past = -(dom.range().unwrap().last as i32 + 1);
        assert_eq!(reg.normalize_in(&slot, past), past);
        assert_eq!(reg.normalize_in(&slot, -4000), -4000);
        assert_eq!(reg.normalize_in(&slot, i32::MIN), i32::MIN);
        assert!(!slot.is_pending());
    }

    #[test]
    fn last_failure_wins() {
        let (reg, dom) = alpha_registry();
        let slot = DiagSlot::new();
        reg.normalize_in(&slot, dom.report(&ALPHA_SITES[0]));
        reg.normalize_in(&slot, dom.report(&ALPHA_SITES[2]));

        let mut out = Vec::new();
        reg.retrieve_in(&slot, &mut out, 4096).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&out[..out.len() - 1]).unwrap();
        assert_eq!(v["message"], "object busy");
    }

    #[test]
    fn transport_failure_keeps_slot() {
        let (reg, dom) = alpha_registry();
        let slot = DiagSlot::new();
        let code = dom.report(&ALPHA_SITES[1]);
        reg.normalize_in(&slot, code);

        let err = reg.retrieve_in(&slot, &mut Refuse, 64).unwrap_err();
        assert_eq!(err, ExtError::Transport(Fault::new()));
        assert_eq!(slot.get(), Some(code.unsigned_abs()));

        let mut buf = [0u8; 256];
        assert!(reg.retrieve_in(&slot, &mut buf[..], 256).unwrap().is_some());
        assert!(!slot.is_pending());
    }

    #[test]
    fn zero_capacity_keeps_slot() {
        let (reg, dom) = alpha_registry();
        let slot = DiagSlot::new();
        reg.normalize_in(&slot, dom.report(&ALPHA_SITES[1]));
        let mut buf = [0u8; 0];
        assert_eq!(reg.retrieve_in(&slot, &mut buf[..], 0), Err(ExtError::BufferTooSmall));
        assert!(slot.is_pending());
    }

    #[test]
    fn truncation_is_terminated_for_every_capacity() {
        let (reg, dom) = alpha_registry();
        for cap in 1..200 {
            let slot = DiagSlot::new();
            reg.normalize_in(&slot, dom.report(&ALPHA_SITES[0]));
            let mut buf = vec![0xaau8; cap];
            let n = reg.retrieve_in(&slot, &mut buf[..], cap).unwrap().unwrap();
            assert!(n <= cap);
            assert_eq!(buf[n - 1], 0, "cap={}", cap);
            assert!(!buf[..n - 1].contains(&0));
        }
    }

    static FAULTY_SITES: [ErrorSite; 1] =
        [ErrorSite::new("broken", "faulty", "src/faulty.rs", 1, -libc::EIO)];

    fn fmt_fail(_: &ErrorSite, _: &mut FieldWriter<'_>) -> fmt::Result {
        Err(fmt::Error)
    }

    #[test]
    fn format_failure_keeps_slot() {
        set_log_level(LogLevel::Off);
        let dom: &'static ErrorDomain =
            Box::leak(Box::new(ErrorDomain::with_format("faulty", &FAULTY_SITES, fmt_fail)));
        let reg = Registry::build(RegistryConfig::default(), [dom]).unwrap();
        let slot = DiagSlot::new();
        assert_eq!(reg.normalize_in(&slot, dom.report(&FAULTY_SITES[0])), -libc::EIO);

        let mut buf = [0u8; 64];
        let err = reg.retrieve_in(&slot, &mut buf[..], 64).unwrap_err();
        assert_eq!(err, ExtError::FormatFailed { domain: "faulty" });
        assert_eq!(err.errno(), libc::ENOMEM);
        assert!(slot.is_pending());
    }

    #[test]
    fn stale_slot_from_other_registry_is_dropped() {
        let (reg, _) = alpha_registry();
        let slot = DiagSlot::new();
        slot.set(4000);
        let mut buf = [0u8; 64];
        assert_eq!(reg.retrieve_in(&slot, &mut buf[..], 64).unwrap(), None);
        assert!(!slot.is_pending());
    }

    static FIRST_SITES: [ErrorSite; 2] = [
        ErrorSite::new("first a", "first", "src/first.rs", 1, -libc::EBADF),
        ErrorSite::new("first b", "first", "src/first.rs", 2, -libc::EPERM),
    ];

    static SECOND_SITES: [ErrorSite; 2] = [
        ErrorSite::new("second a", "second", "src/second.rs", 1, -libc::EIO),
        ErrorSite::new("second b", "second", "src/second.rs", 2, -libc::ENOSPC),
    ];

    #[test]
    fn rebuilt_registry_keeps_earlier_domains_apart() {
        set_log_level(LogLevel::Off);
        let first: &'static ErrorDomain =
            Box::leak(Box::new(ErrorDomain::new("first", &FIRST_SITES)));
        let second: &'static ErrorDomain =
            Box::leak(Box::new(ErrorDomain::new("second", &SECOND_SITES)));

        drop(Registry::build(RegistryConfig::default(), [first]).unwrap());
        let reg = Registry::build(RegistryConfig::default(), [first, second]).unwrap();
        assert_eq!(reg.len(), 2);
        assert!(!first.range().unwrap().overlaps(&second.range().unwrap()));

        let slot = DiagSlot::new();
        assert_eq!(reg.normalize_in(&slot, first.report(&FIRST_SITES[1])), -libc::EPERM);
        let mut out = Vec::new();
        reg.retrieve_in(&slot, &mut out, 1024).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&out[..out.len() - 1]).unwrap();
        assert_eq!(v["message"], "first b");

        assert_eq!(reg.normalize_in(&slot, second.report(&SECOND_SITES[1])), -libc::ENOSPC);
    }

    #[test]
    fn thread_local_slots_do_not_leak_across_threads() {
        let (reg, dom) = alpha_registry();
        let reg = std::sync::Arc::new(reg);
        crate::slot::clear_current();

        assert_eq!(reg.normalize(dom.report(&ALPHA_SITES[2])), -libc::EBUSY);

        let r = reg.clone();
        let seen = std::thread::spawn(move || {
            let mut buf = [0u8; 128];
            r.retrieve(&mut buf).unwrap()
        })
        .join()
        .unwrap();
        assert_eq!(seen, None);

        let mut buf = [0u8; 128];
        assert!(reg.retrieve(&mut buf).unwrap().is_some());
        assert_eq!(reg.retrieve(&mut buf).unwrap(), None);
    }
}
