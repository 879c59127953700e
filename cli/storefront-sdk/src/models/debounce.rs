//! Debouncing of free text input.

use std::time::Duration;

use tokio::time::Instant;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Holds the latest input until it stayed unchanged for the configured delay.
///
/// Every [Debouncer::push] restarts the timer, so only the last value of a
/// burst of input settles.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace the pending value and restart the timer.
    pub fn push(&mut self, value: T) {
        self.pending = Some((value, Instant::now() + self.delay));
    }

    /// Drop the pending value, if any.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending value settles.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    /// Take the pending value if its deadline passed at `now`.
    pub fn poll_settled(&mut self, now: Instant) -> Option<T> {
        match self.deadline() {
            Some(deadline) if deadline <= now => self.cancel(),
            _ => None,
        }
    }

    /// Wait for the pending value to settle.
    ///
    /// Never resolves while nothing is pending,
    /// which makes it usable as a `tokio::select!` branch.
    /// Cancel safe: dropping the future keeps the pending value.
    pub async fn settled(&mut self) -> T {
        loop {
            let Some(deadline) = self.deadline() else {
                return std::future::pending().await;
            };
            tokio::time::sleep_until(deadline).await;
            if let Some(value) = self.poll_settled(Instant::now()) {
                return value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn only_last_value_settles() {
        let mut debouncer = Debouncer::default();
        debouncer.push("s");
        tokio::time::advance(Duration::from_millis(100)).await;
        debouncer.push("sh");
        tokio::time::advance(Duration::from_millis(250)).await;
        debouncer.push("shoes");

        let start = Instant::now();
        assert_eq!(debouncer.settled().await, "shoes");
        assert!(start.elapsed() >= DEFAULT_DEBOUNCE);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_pending_never_settles() {
        let mut debouncer = Debouncer::<String>::new(Duration::from_millis(50));
        let result = tokio::time::timeout(Duration::from_secs(5), debouncer.settled()).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_value_does_not_settle() {
        let mut debouncer = Debouncer::default();
        debouncer.push(1);
        assert_eq!(debouncer.cancel(), Some(1));
        assert_eq!(debouncer.poll_settled(Instant::now() + DEFAULT_DEBOUNCE), None);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_wait_keeps_value() {
        let mut debouncer = Debouncer::default();
        debouncer.push("lamp");

        let early = tokio::time::timeout(Duration::from_millis(10), debouncer.settled()).await;
        assert!(early.is_err());
        assert!(debouncer.is_pending());
        assert_eq!(debouncer.settled().await, "lamp");
    }

    #[test]
    fn poll_before_deadline() {
        let mut debouncer = Debouncer::new(Duration::from_millis(300));
        let now = Instant::now();
        debouncer.push(());
        assert_eq!(debouncer.poll_settled(now), None);
        assert!(debouncer.is_pending());
    }
}
