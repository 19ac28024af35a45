//! Per-device message sequence numbers.

/// Sparkplug `seq` counter: 0-255, wrapping back to 0.
///
/// Every NBIRTH and NDATA of a device consumes exactly one number. Only the
/// owning session advances it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceCounter {
    next: u8,
}

impl SequenceCounter {
    /// Creates a counter whose first number is 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number the next message will carry.
    pub fn peek(&self) -> u8 {
        self.next
    }

    /// Returns the current number and advances, wrapping 255 to 0.
    pub(crate) fn next(&mut self) -> u8 {
        let seq = self.next;
        self.next = self.next.wrapping_add(1);
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_zero() {
        let mut counter = SequenceCounter::new();
        assert_eq!(counter.peek(), 0);
        assert_eq!(counter.next(), 0);
        assert_eq!(counter.peek(), 1);
    }

    #[test]
    fn test_wraps_after_255() {
        let mut counter = SequenceCounter::new();
        let seen: Vec<u8> = (0..300).map(|_| counter.next()).collect();
        assert_eq!(seen[255], 255);
        assert_eq!(seen[256], 0);
        assert_eq!(seen[299], 43);
        for pair in seen.windows(2) {
            assert_eq!(pair[1], pair[0].wrapping_add(1));
        }
    }
}
