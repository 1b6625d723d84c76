//! Suppression of change notifications caused by the session's own writes.
//!
//! Each write is tagged with a generation number and the SHA-256 digest of the
//! bytes written. A notification is only attributed to that write if the file
//! still holds exactly those bytes, so an external edit racing with our write
//! is never swallowed.

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
struct ArmedWrite {
    generation: u64,
    digest: [u8; 32],
}

/// Tracks the most recent write performed by the session.
#[derive(Debug, Default)]
pub struct WriteGuard {
    generation: u64,
    armed: Option<ArmedWrite>,
}

impl WriteGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `content` is about to be written. Returns its generation.
    pub fn arm(&mut self, content: &str) -> u64 {
        self.generation += 1;
        self.armed = Some(ArmedWrite {
            generation: self.generation,
            digest: digest(content),
        });
        self.generation
    }

    /// Returns true if the armed write is still pending an echo.
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Checks a notification's file content against the armed write.
    ///
    /// Returns true (and disarms) if the content is the echo of our own write.
    /// Any other content also disarms, since the file has moved on.
    pub fn is_own_write(&mut self, content: &str) -> bool {
        match self.armed.take() {
            Some(armed) if armed.digest == digest(content) => {
                tracing::debug!(generation = armed.generation, "Dropping echo of own write");
                true
            }
            _ => false,
        }
    }
}

fn digest(content: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(content.as_bytes()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unarmed_guard_passes_everything() {
        let mut guard = WriteGuard::new();
        assert!(!guard.is_own_write("anything"));
    }

    #[test]
    fn test_echo_is_dropped_once() {
        let mut guard = WriteGuard::new();
        guard.arm("hello");
        assert!(guard.is_armed());
        assert!(guard.is_own_write("hello"));
        assert!(!guard.is_armed());
        assert!(!guard.is_own_write("hello"));
    }

    #[test]
    fn test_external_edit_is_not_swallowed() {
        let mut guard = WriteGuard::new();
        guard.arm("hello");
        assert!(!guard.is_own_write("hello, edited elsewhere"));
        assert!(!guard.is_armed());
    }

    #[test]
    fn test_generations_increase() {
        let mut guard = WriteGuard::new();
        let first = guard.arm("a");
        let second = guard.arm("b");
        assert!(second > first);
        assert!(!guard.is_own_write("a"));
    }
}
