//! Registry configuration

use crate::env::env_get_opt;
use crate::error::{ExtError, ExtResult};
use crate::{kwarn, EXT_BASE, MAX_CODE};

/// Shape of the numeric budget a registry hands out.
///
/// Magnitudes `1..ext_base` are plain codes; `ext_base..max_code` is the
/// window carved up between domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// First magnitude reserved for extended codes
    pub ext_base: u32,

    /// Size of the narrow channel; no magnitude reaches it
    pub max_code: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ext_base: EXT_BASE,
            max_code: MAX_CODE,
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `EXTERR_EXT_BASE` / `EXTERR_MAX_CODE`.
    ///
    /// An inconsistent combination is logged and replaced by the defaults.
    pub fn from_env() -> Self {
        Self::with_overrides(env_get_opt("EXT_BASE"), env_get_opt("MAX_CODE"))
    }

    fn with_overrides(ext_base: Option<u32>, max_code: Option<u32>) -> Self {
        let mut config = Self::default();
        match ext_base {
            // Site codes are only checked against EXT_BASE at compile time.
            Some(base) if base < EXT_BASE => {
                kwarn!("ignoring EXTERR_EXT_BASE={}: below {}", base, EXT_BASE);
            }
            Some(base) => config.ext_base = base,
            None => {}
        }
        if let Some(max) = max_code {
            config.max_code = max;
        }
        match config.validate() {
            Ok(()) => config,
            Err(e) => {
                kwarn!("ignoring environment overrides: {}", e);
                Self::default()
            }
        }
    }

    pub fn ext_base(mut self, n: u32) -> Self {
        self.ext_base = n;
        self
    }

    pub fn max_code(mut self, n: u32) -> Self {
        self.max_code = n;
        self
    }

    /// Number of extended magnitudes available to domains.
    #[inline]
    pub fn budget(&self) -> u32 {
        self.max_code.saturating_sub(self.ext_base)
    }

    /// `0 < ext_base < max_code <= MAX_CODE`.
    pub fn validate(&self) -> ExtResult<()> {
        if self.ext_base == 0 {
            return Err(ExtError::InvalidConfig("ext_base must be non-zero"));
        }
        if self.ext_base >= self.max_code {
            return Err(ExtError::InvalidConfig("ext_base must be below max_code"));
        }
        if self.max_code > MAX_CODE {
            return Err(ExtError::InvalidConfig("max_code exceeds the narrow channel"));
        }
        Ok(())
    }
}
