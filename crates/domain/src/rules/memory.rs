//! Number-sequence memory game: hidden values revealed in ascending order.

use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;

/// How long a wrong reveal stays visible before the board flips back.
pub const FLIP_BACK_DELAY: Duration = Duration::from_millis(800);

/// Uniformly shuffled permutation of `1..=n`.
pub fn generate_sequence<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<u32> {
    let mut values: Vec<u32> = (1..=n as u32).collect();
    values.shuffle(rng);
    values
}

/// Result of revealing one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Correct value; `next` is now expected.
    Advanced { next: u32 },
    /// The last value was revealed. Round won.
    Completed,
    /// Wrong value; all cells flip back after `reset_after`.
    Mismatch { reset_after: Duration },
    /// Reveal not accepted (round over or flip-back pending).
    Ignored,
}

/// Tracks `nextExpectedValue` for one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryProgress {
    next_expected: u32,
    total: u32,
    reset_pending: bool,
}

impl MemoryProgress {
    pub fn new(total: usize) -> Self {
        Self {
            next_expected: 1,
            total: total as u32,
            reset_pending: false,
        }
    }

    pub fn next_expected(&self) -> u32 {
        self.next_expected
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn is_complete(&self) -> bool {
        self.next_expected > self.total
    }

    pub fn is_reset_pending(&self) -> bool {
        self.reset_pending
    }

    pub fn reveal(&mut self, value: u32) -> RevealOutcome {
        if self.is_complete() || self.reset_pending {
            return RevealOutcome::Ignored;
        }
        if value != self.next_expected {
            self.reset_pending = true;
            return RevealOutcome::Mismatch {
                reset_after: FLIP_BACK_DELAY,
            };
        }
        self.next_expected += 1;
        if self.is_complete() {
            RevealOutcome::Completed
        } else {
            RevealOutcome::Advanced {
                next: self.next_expected,
            }
        }
    }

    /// Apply a scheduled flip-back.
    pub fn reset(&mut self) {
        self.next_expected = 1;
        self.reset_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sequence_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(42);
        for n in [4usize, 9, 16] {
            for _ in 0..50 {
                let mut seq = generate_sequence(n, &mut rng);
                assert_eq!(seq.len(), n);
                seq.sort_unstable();
                assert_eq!(seq, (1..=n as u32).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn test_sequence_is_shuffled() {
        let mut rng = StdRng::seed_from_u64(1);
        let identity: Vec<u32> = (1..=16).collect();
        let shuffled = (0..20).any(|_| generate_sequence(16, &mut rng) != identity);
        assert!(shuffled);
    }

    #[test]
    fn test_ascending_reveals_complete_the_round() {
        let mut progress = MemoryProgress::new(9);
        for value in 1..9 {
            assert_eq!(
                progress.reveal(value),
                RevealOutcome::Advanced { next: value + 1 }
            );
        }
        assert_eq!(progress.reveal(9), RevealOutcome::Completed);
        assert!(progress.is_complete());
        assert_eq!(progress.reveal(1), RevealOutcome::Ignored);
    }

    #[test]
    fn test_wrong_value_schedules_reset() {
        let mut progress = MemoryProgress::new(9);
        assert_eq!(progress.reveal(1), RevealOutcome::Advanced { next: 2 });
        assert_eq!(
            progress.reveal(5),
            RevealOutcome::Mismatch {
                reset_after: FLIP_BACK_DELAY
            }
        );
        assert!(progress.is_reset_pending());
        assert_eq!(progress.reveal(2), RevealOutcome::Ignored);

        progress.reset();
        assert_eq!(progress.next_expected(), 1);
        assert!(!progress.is_reset_pending());
    }
}
