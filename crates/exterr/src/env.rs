//! Environment variable helpers
//!
//! All knobs live under the `EXTERR_` prefix:
//!
//! | Variable              | Meaning                                   |
//! |-----------------------|-------------------------------------------|
//! | `EXTERR_EXT_BASE`     | First magnitude reserved for extended codes |
//! | `EXTERR_MAX_CODE`     | Size of the narrow channel                |
//! | `EXTERR_LOG_LEVEL`    | `off`, `error`, `warn`, `info`, `debug`, `trace` or `0..5` |
//! | `EXTERR_FLUSH_EPRINT` | Flush stderr after every log line         |

use std::str::FromStr;

/// Prefix shared by every variable this crate reads.
pub const ENV_PREFIX: &str = "EXTERR_";

/// Full variable name for `name`, e.g. `"MAX_CODE"` → `"EXTERR_MAX_CODE"`.
#[inline]
pub fn env_key(name: &str) -> String {
    format!("{}{}", ENV_PREFIX, name)
}

/// Parse `EXTERR_<name>` as `T`, or return `default` if unset or invalid.
#[inline]
pub fn env_get<T>(name: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(name).unwrap_or(default)
}

/// Parse `EXTERR_<name>` as `T`, `None` if unset or invalid.
#[inline]
pub fn env_get_opt<T>(name: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(env_key(name)).ok().and_then(|v| v.trim().parse().ok())
}

/// `EXTERR_<name>` as a flag: "1", "true", "yes", "on" (any case) are true.
#[inline]
pub fn env_get_bool(name: &str, default: bool) -> bool {
    match std::env::var(env_key(name)) {
        Ok(val) => matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}
