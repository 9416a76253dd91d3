//! Sticky disable latch.
//!
//! Holds the first hardware error seen by `NapCore`. Set at most once,
//! never cleared; reads are lock-free.

use crate::error::NapError;
use std::sync::OnceLock;

/// Set-once cell capturing the first unrecoverable hardware error.
#[derive(Debug, Default)]
pub struct DisableLatch {
    cause: OnceLock<NapError>,
}

impl DisableLatch {
    /// Create an unset latch.
    pub const fn new() -> Self {
        Self {
            cause: OnceLock::new(),
        }
    }

    /// Store `err` if the latch is still unset.
    ///
    /// Returns `true` if this call set the latch, `false` if an earlier
    /// error already occupies it.
    pub fn latch(&self, err: NapError) -> bool {
        self.cause.set(err).is_ok()
    }

    /// The stored error, if any.
    pub fn cause(&self) -> Option<&NapError> {
        self.cause.get()
    }

    /// Whether the latch has been set.
    pub fn is_set(&self) -> bool {
        self.cause.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NapErrorKind;
    use std::sync::Arc;

    #[test]
    fn first_error_wins() {
        let latch = DisableLatch::new();
        assert!(!latch.is_set());

        assert!(latch.latch(NapError::DeviceAbsent("/dev/i2c-1".to_string())));
        assert!(!latch.latch(NapError::BusOpenFailed("EBUSY".to_string())));

        assert_eq!(latch.cause().map(NapError::kind), Some(NapErrorKind::DeviceAbsent));
    }

    #[test]
    fn concurrent_setters_agree() {
        let latch = Arc::new(DisableLatch::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let latch = Arc::clone(&latch);
                std::thread::spawn(move || latch.latch(NapError::BusOpenFailed(format!("err {i}"))))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(latch.is_set());
    }
}
