use std::time::Duration;
use tracing::trace;

/// Fixed pre-call delay keeping outbound requests under `n` per second.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    delay: Duration,
}

impl Throttle {
    pub fn per_second(requests: u32) -> Self {
        Throttle {
            delay: Duration::from_secs_f64(1.0 / f64::from(requests.max(1))),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn wait(&self) {
        trace!(delay = ?self.delay, "Throttling outbound request");
        tokio::time::sleep(self.delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_delay_for_seven_per_second() {
        let throttle = Throttle::per_second(7);
        assert_eq!(throttle.delay(), Duration::from_secs_f64(1.0 / 7.0));
    }

    #[tokio::test]
    async fn test_consecutive_waits_are_spaced() {
        let throttle = Throttle::per_second(7);
        let mut stamps = Vec::new();
        for _ in 0..3 {
            throttle.wait().await;
            stamps.push(Instant::now());
        }
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= throttle.delay());
        }
    }
}
