//! Boundary transport: the bounded byte copy that hands a rendered
//! diagnostic to the caller.
//!
//! The engine never writes into caller memory directly. It hands the final,
//! already truncated and terminated bytes to a [`CopyOut`] in one call; the
//! implementation is responsible for whatever boundary lies in between
//! (another address space, an IPC buffer, a plain slice).

use core::fmt;

/// Destination refused the copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    errno: i32,
}

impl Fault {
    /// The usual "bad address" fault.
    pub const fn new() -> Self {
        Self { errno: libc::EFAULT }
    }

    /// A fault carrying a transport-specific errno.
    pub const fn with_errno(errno: i32) -> Self {
        Self { errno }
    }

    /// Positive errno value.
    #[inline]
    pub fn errno(&self) -> i32 {
        self.errno
    }
}

impl Default for Fault {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errno == libc::EFAULT {
            write!(f, "bad destination address")
        } else {
            write!(f, "copy failed (errno {})", self.errno)
        }
    }
}

impl std::error::Error for Fault {}

/// A destination that accepts one bounded copy.
///
/// `bytes` is never longer than the capacity the caller passed to retrieve.
/// Either all of it lands or the call fails; partial copies are not a thing.
pub trait CopyOut {
    fn copy_out(&mut self, bytes: &[u8]) -> Result<(), Fault>;
}

impl CopyOut for [u8] {
    fn copy_out(&mut self, bytes: &[u8]) -> Result<(), Fault> {
        let dst = self.get_mut(..bytes.len()).ok_or(Fault::new())?;
        dst.copy_from_slice(bytes);
        Ok(())
    }
}

impl CopyOut for Vec<u8> {
    fn copy_out(&mut self, bytes: &[u8]) -> Result<(), Fault> {
        self.clear();
        self.extend_from_slice(bytes);
        Ok(())
    }
}

impl<C: CopyOut + ?Sized> CopyOut for &mut C {
    #[inline]
    fn copy_out(&mut self, bytes: &[u8]) -> Result<(), Fault> {
        (**self).copy_out(bytes)
    }
}
