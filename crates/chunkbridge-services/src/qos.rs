//! QoS: minimum-interval send gate per subscriber.
//!
//! A subscriber is written to at most once per `min_interval`. A message that
//! arrives sooner is dropped for that subscriber, never queued for later:
//! live data is only worth its most recent value.
//!
//! A zero interval disables the gate.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct SendGate {
    min_interval: Duration,
    last_sent: Option<Instant>,
}

impl SendGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_sent: None,
        }
    }

    /// Returns true if a message may be written now. Allowing a send records it.
    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }

    pub fn allow_at(&mut self, now: Instant) -> bool {
        let allowed = match self.last_sent {
            None => true,
            Some(_) if self.min_interval.is_zero() => true,
            Some(last) => now.saturating_duration_since(last) > self.min_interval,
        };
        if allowed {
            self.last_sent = Some(now);
        }
        allowed
    }

    /// Record a send that bypassed the gate.
    pub fn mark_sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }

    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}
