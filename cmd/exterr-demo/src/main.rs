//! Extended errno demo
//!
//! Two subsystems declare error domains; a fake syscall boundary
//! normalizes their codes and callers fetch the rich diagnostic.
//!
//! # Environment Variables
//!
//! - `EXTERR_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `EXTERR_FLUSH_EPRINT=1` - Flush log output immediately
//! - `EXTERR_EXT_BASE` / `EXTERR_MAX_CODE` - Override the extended window

use std::fmt;

use exterr::{error_domain, ext_site, register_domain, ErrorSite, FieldWriter, SiteRecord};
use exterr::{kinfo, kwarn};

// ── attr: size-checked structure copies ───────────────────────────

#[repr(C)]
struct AttrSite {
    site: ErrorSite,
    /// Offset of the offending member
    member: u32,
    /// Largest size this build understands
    max_size: u32,
}

unsafe impl SiteRecord for AttrSite {
    fn site(&self) -> &ErrorSite {
        &self.site
    }
}

const ATTR_MAX: u32 = 64;

static ATTR_SITES: [AttrSite; 3] = [
    AttrSite {
        site: ext_site!(owner = "attr", -libc::EINVAL, "size smaller than first version"),
        member: 0,
        max_size: ATTR_MAX,
    },
    AttrSite {
        site: ext_site!(owner = "attr", -libc::E2BIG, "unknown trailing bytes are non-zero"),
        member: ATTR_MAX,
        max_size: ATTR_MAX,
    },
    AttrSite {
        site: ext_site!(owner = "attr", -libc::EINVAL, "reserved flag bits set"),
        member: 8,
        max_size: ATTR_MAX,
    },
];

fn format_attr(rec: &AttrSite, out: &mut FieldWriter<'_>) -> fmt::Result {
    out.field("member", &rec.member)?;
    out.field("max_size", &rec.max_size)
}

error_domain!(ATTR, "attr", ATTR_SITES: AttrSite, format = format_attr);

// ── sched: plain sites ────────────────────────────────────────────

static SCHED_SITES: [ErrorSite; 2] = [
    ext_site!(owner = "sched", -libc::EPERM, "policy requires CAP_SYS_NICE"),
    ext_site!(owner = "sched", -libc::EINVAL, "priority out of range for policy"),
];

error_domain!(SCHED, "sched", SCHED_SITES);

register_domain!(ATTR, SCHED);

// ── Fake kernel side ──────────────────────────────────────────────

fn copy_attr(bytes: &[u8]) -> i32 {
    if bytes.len() < 8 {
        return ATTR.report(&ATTR_SITES[0]);
    }
    if bytes.len() > ATTR_MAX as usize && bytes[ATTR_MAX as usize..].iter().any(|&b| b != 0) {
        return ATTR.report(&ATTR_SITES[1]);
    }
    if bytes[0] & 0xf0 != 0 {
        return ATTR.report(&ATTR_SITES[2]);
    }
    0
}

fn set_priority(policy: u32, prio: i32) -> i32 {
    if policy == 1 {
        return SCHED.report(&SCHED_SITES[0]);
    }
    if !(0..=99).contains(&prio) {
        return SCHED.report(&SCHED_SITES[1]);
    }
    0
}

/// The boundary every "syscall" returns through.
fn syscall(ret: i32) -> i32 {
    exterr::normalize(ret)
}

// ── User side ─────────────────────────────────────────────────────

fn explain(what: &str, ret: i32) {
    if ret >= 0 {
        println!("{:<28} ok", what);
        return;
    }
    println!("{:<28} failed: {} ({})", what, ret, std::io::Error::from_raw_os_error(-ret));

    let mut buf = [0u8; 512];
    match exterr::retrieve(&mut buf) {
        Ok(Some(n)) => {
            let text = String::from_utf8_lossy(&buf[..n - 1]);
            for line in text.lines() {
                println!("    {}", line);
            }
        }
        Ok(None) => println!("    (no extended diagnostic)"),
        Err(e) => kwarn!("retrieve failed: {} (errno {})", e, e.errno()),
    }
}

// EXTERR_LOG_LEVEL=info cargo run -p exterr-demo
fn main() {
    println!("=== exterr demo ===\n");

    exterr::kprint::init();
    let registry = match exterr::init() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("exterr init failed: {}", e);
            std::process::exit(1);
        }
    };
    for (domain, range) in registry.domains() {
        println!("domain {:<8} {} ({} sites)", domain.name(), range, domain.len());
    }
    for skipped in registry.skipped() {
        println!("skipped {} ({:?})", skipped.name, skipped.reason);
    }
    println!();

    explain("copy_attr(4 bytes)", syscall(copy_attr(&[0; 4])));
    let mut big = vec![0u8; 80];
    big[70] = 1;
    explain("copy_attr(80 bytes)", syscall(copy_attr(&big)));
    explain("copy_attr(flags 0x10)", syscall(copy_attr(&[0x10, 0, 0, 0, 0, 0, 0, 0])));
    explain("copy_attr(valid)", syscall(copy_attr(&[1; 16])));
    explain("set_priority(policy 1)", syscall(set_priority(1, 10)));

    // Plain errnos pass through and leave nothing behind.
    explain("plain -EAGAIN", syscall(-libc::EAGAIN));

    // A short buffer still gets a terminated prefix.
    syscall(set_priority(0, 200));
    let mut short = [0u8; 24];
    let n = exterr::retrieve_errno(&mut short);
    println!("\nshort retrieve: {} bytes {:?}", n, String::from_utf8_lossy(&short[..23]));

    println!("\nper-thread slots:");
    let handles: Vec<_> = (0..4)
        .map(|i| {
            std::thread::spawn(move || {
                let ret = if i % 2 == 0 {
                    syscall(set_priority(0, 100 + i))
                } else {
                    syscall(copy_attr(&[0; 2]))
                };
                let mut buf = [0u8; 512];
                let n = exterr::retrieve_errno(&mut buf);
                (i, ret, n)
            })
        })
        .collect();
    for h in handles {
        match h.join() {
            Ok((i, ret, n)) => println!("  thread {}: ret={} payload={} bytes", i, ret, n),
            Err(_) => kwarn!("worker panicked"),
        }
    }

    #[cfg(feature = "metrics")]
    {
        println!("\n{}", exterr::metrics::dump_prometheus(registry));
    }

    kinfo!("{} magnitudes left in the extended window", registry.remaining());
    println!("\n=== demo complete ===");
}
