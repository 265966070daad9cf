//! Token-bucket throttling for outbound messaging.
//!
//! Gateways publish a sustained rate plus a burst allowance; the bucket
//! mirrors that shape.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// A shared token bucket. `burst` tokens are available up front and refill
/// continuously at `rate_per_second`.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    rate_per_second: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Non-positive inputs are clamped to the smallest usable bucket.
    #[must_use]
    pub fn new(rate_per_second: f64, burst: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            capacity,
            rate_per_second: if rate_per_second > 0.0 { rate_per_second } else { 1.0 },
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.reserve().is_ok()
    }

    /// Wait until a token is available, then take it.
    pub async fn acquire(&self) {
        while let Err(wait) = self.reserve() {
            tokio::time::sleep(wait).await;
        }
    }

    /// Tokens currently available, rounded down.
    pub fn available(&self) -> u32 {
        let mut bucket = self.lock();
        self.refill(&mut bucket);
        bucket.tokens.floor() as u32
    }

    fn reserve(&self) -> Result<(), Duration> {
        let mut bucket = self.lock();
        self.refill(&mut bucket);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - bucket.tokens;
            Err(Duration::from_secs_f64(missing / self.rate_per_second))
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate_per_second).min(self.capacity);
        bucket.last_refill = now;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Bucket> {
        // A panic while holding the guard leaves the bucket numerically valid.
        self.bucket.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
