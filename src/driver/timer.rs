use tokio::time::{Duration, Instant};

/// Debounce deadline for a delayed stop command.
///
/// Holds at most one deadline. The driver's select loop sleeps until it, so
/// cancelling is just clearing the field.
#[derive(Debug, Default)]
pub(crate) struct StopTimer {
    deadline: Option<Instant>,
}

impl StopTimer {
    /// Arm for `delay` from now, replacing any outstanding deadline
    pub(crate) fn arm(&mut self, delay: Duration) -> Instant {
        self.cancel();
        let deadline = Instant::now() + delay;
        self.deadline = Some(deadline);
        deadline
    }

    /// Returns whether a deadline was outstanding
    pub(crate) fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[cfg(test)]
    pub(crate) fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    pub(crate) fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }
}

/// Sleep until `deadline`, or forever when there is none
pub(crate) async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn arm_replaces_and_cancel_clears() {
        let mut timer = StopTimer::default();
        assert!(!timer.is_armed());
        assert!(!timer.cancel());

        let first = timer.arm(Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(4)).await;
        let second = timer.arm(Duration::from_secs(10));
        assert!(second > first);
        assert_eq!(timer.deadline(), Some(second));
        assert_eq!(
            timer.remaining(Instant::now()),
            Some(Duration::from_secs(10))
        );

        assert!(timer.cancel());
        assert!(!timer.is_armed());
        assert_eq!(timer.remaining(Instant::now()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn due_only_after_deadline() {
        let mut timer = StopTimer::default();
        timer.arm(Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(!timer.is_due(Instant::now()));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(timer.is_due(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_at_deadline() {
        let deadline = Instant::now() + Duration::from_secs(3);
        sleep_until_deadline(Some(deadline)).await;
        assert!(Instant::now() >= deadline);
    }
}
