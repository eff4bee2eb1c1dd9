//! Exponential backoff state shared by join retries and reconnect logic.

use std::time::Duration;

use crate::config::RetryPolicy;

#[derive(Debug, Clone, Copy)]
pub struct BackoffState {
    policy: RetryPolicy,
    attempts: u32,
}

impl BackoffState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.policy.max_attempts
    }

    /// Advance to the next attempt.
    ///
    /// Returns the delay to wait *before* performing this attempt, or `None`
    /// once the attempt ceiling is reached.
    pub fn next_delay_and_advance(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;
        Some(self.policy.delay_for(self.attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_sequence_and_exhaustion() {
        let mut backoff = BackoffState::new(RetryPolicy::default());
        let mut delays = Vec::new();
        while let Some(delay) = backoff.next_delay_and_advance() {
            delays.push(delay.as_secs());
        }
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.attempts(), 5);

        backoff.reset();
        assert_eq!(backoff.next_delay_and_advance(), Some(Duration::from_secs(1)));
    }
}
