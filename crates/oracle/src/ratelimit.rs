//! A per-credential token bucket, enforcing `oracle.rate_per_minute`.

use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Bucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(capacity_per_minute: u32) -> Self {
        let capacity = capacity_per_minute.max(1) as f64;
        Bucket { capacity, tokens: capacity, refill_per_sec: capacity / 60.0, last_refill: Instant::now() }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Seconds to wait before one token is available, or zero if already available.
    fn wait_needed(&mut self) -> Duration {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Duration::ZERO
        } else {
            let deficit = 1.0 - self.tokens;
            self.tokens = 0.0;
            Duration::from_secs_f64(deficit / self.refill_per_sec)
        }
    }
}

/// One token bucket per credential ring slot, keyed by rotator index.
pub struct RateLimiter {
    buckets: Vec<Mutex<Bucket>>,
}

impl RateLimiter {
    pub fn new(slot_count: usize, capacity_per_minute: u32) -> Self {
        let buckets = (0..slot_count.max(1)).map(|_| Mutex::new(Bucket::new(capacity_per_minute))).collect();
        RateLimiter { buckets }
    }

    /// Blocks (async sleep) until a token is available for `slot_index`.
    pub async fn acquire(&self, slot_index: usize) {
        loop {
            let wait = {
                let idx = slot_index % self.buckets.len();
                let mut bucket = self.buckets[idx].lock().expect("rate limiter lock poisoned");
                bucket.wait_needed()
            };
            if wait.is_zero() {
                return;
            }
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_calls_up_to_capacity_do_not_wait() {
        let limiter = RateLimiter::new(1, 60);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire(0).await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn bucket_refills_over_time() {
        let mut bucket = Bucket::new(60);
        bucket.tokens = 0.0;
        bucket.last_refill = Instant::now() - Duration::from_secs(2);
        let wait = bucket.wait_needed();
        assert_eq!(wait, Duration::ZERO);
    }

    #[test]
    fn exhausted_bucket_reports_nonzero_wait() {
        let mut bucket = Bucket::new(60);
        bucket.tokens = 0.0;
        bucket.last_refill = Instant::now();
        let wait = bucket.wait_needed();
        assert!(wait > Duration::ZERO);
    }
}
