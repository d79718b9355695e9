//! Respawn policy for supervised instances.
//!
//! The default keeps the fleet size constant: a fixed one-second delay and no
//! attempt cap. Exponential growth and a cap on consecutive attempts are
//! opt-in, so a crash-looping command can be made to back off or give up.
//!
//! The delay for attempt `n` (1-based) is `delay * factor^(n-1)`, clamped to `max`.

use std::time::Duration;

pub const DEFAULT_RESPAWN_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_FACTOR: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay every time.
    Fixed,
    /// Delay grows by `factor` per consecutive attempt, up to `max`.
    Exponential { factor: f64, max: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RespawnPolicy {
    pub backoff: Backoff,
    /// Delay before the first respawn.
    pub delay: Duration,
    /// Consecutive respawns allowed without a clean exit; `None` is unlimited.
    pub max_attempts: Option<u32>,
}

impl Default for RespawnPolicy {
    fn default() -> Self {
        Self {
            backoff: Backoff::Fixed,
            delay: DEFAULT_RESPAWN_DELAY,
            max_attempts: None,
        }
    }
}

impl RespawnPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Delay before respawn number `attempt`, or `None` once the cap is reached.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt > max {
                return None;
            }
        }
        let delay = match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { factor, max } => {
                let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let secs = self.delay.as_secs_f64() * factor.powi(exp);
                if !secs.is_finite() || secs < 0.0 || secs > max.as_secs_f64() {
                    max
                } else {
                    Duration::from_secs_f64(secs)
                }
            }
        };
        Some(delay)
    }
}
