use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Trailing-edge debounce: of several calls arriving within `delay` of each
/// other, only the last one settles.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    generation: AtomicU64,
}

impl Debouncer {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: AtomicU64::new(0),
        }
    }

    /// Waits out the quiet period. Returns `false` if a newer call arrived
    /// in the meantime.
    pub async fn settle(&self) -> bool {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        self.generation.load(Ordering::SeqCst) == ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_only_last_call_settles() {
        let debouncer = Debouncer::new(Duration::from_millis(300));

        let (a, b, c) = tokio::join!(
            debouncer.settle(),
            async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                debouncer.settle().await
            },
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                debouncer.settle().await
            }
        );
        assert_eq!((a, b, c), (false, false, true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_calls_all_settle() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        assert!(debouncer.settle().await);
        assert!(debouncer.settle().await);
    }
}
