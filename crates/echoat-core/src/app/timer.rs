//! The scheduler's single timer slot.

use std::future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::Sleep;

/// At most one pending deadline. Arming replaces (and thereby cancels) the
/// previous one, so a stale timer can never fire.
#[derive(Debug, Default)]
pub(crate) struct Timer {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl Timer {
    pub(crate) fn arm(&mut self, delay: Duration) {
        self.sleep = Some(Box::pin(tokio::time::sleep(delay)));
    }

    pub(crate) fn disarm(&mut self) {
        self.sleep = None;
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// Resolves when the armed deadline passes, then disarms. Pending forever
    /// while disarmed.
    pub(crate) async fn fired(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.sleep = None;
            }
            None => future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay_and_disarms() {
        let mut timer = Timer::default();
        timer.arm(Duration::from_secs(5));
        assert!(timer.is_armed());

        let start = Instant::now();
        timer.fired().await;

        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_deadline() {
        let mut timer = Timer::default();
        timer.arm(Duration::from_secs(60));
        timer.arm(Duration::from_secs(1));

        let start = Instant::now();
        timer.fired().await;
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_timer_never_fires() {
        let mut timer = Timer::default();
        timer.arm(Duration::from_millis(1));
        timer.disarm();
        assert!(!timer.is_armed());

        let outcome = tokio::time::timeout(Duration::from_secs(10), timer.fired()).await;
        assert!(outcome.is_err());
    }
}
