//! Status LED adapter
//!
//! Three patterns cover the whole device lifecycle: off while idle or
//! unprovisioned, solid on while a factory reset is in progress, and a
//! triple pulse when the broker session comes up. Pulse timing is advanced
//! from the cooperative tick; the adapter never sleeps.

use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::debug;

/// Side-effect consumer for supervisor transitions
pub trait StatusIndicator: Send {
    fn set_on(&mut self);
    fn set_off(&mut self);

    /// Blink `count` times: `on_ms` lit, `off_ms` dark, starting immediately
    fn pulse(&mut self, on_ms: u64, off_ms: u64, count: u32);

    /// Advance the active pattern, if any
    fn tick(&mut self, now: Instant);
}

struct PulsePattern {
    on: Duration,
    off: Duration,
    remaining: u32,
    lit: bool,
    until: Option<Instant>,
}

/// sysfs-backed LED
pub struct SysfsLed {
    path: PathBuf,
    pattern: Option<PulsePattern>,
}

impl SysfsLed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pattern: None,
        }
    }

    fn drive(path: &std::path::Path, lit: bool) {
        // an absent LED costs nothing but a debug line
        if let Err(err) = std::fs::write(path, if lit { "1" } else { "0" }) {
            debug!(path = %path.display(), error = %err, "led write failed");
        }
    }
}

impl StatusIndicator for SysfsLed {
    fn set_on(&mut self) {
        self.pattern = None;
        Self::drive(&self.path, true);
    }

    fn set_off(&mut self) {
        self.pattern = None;
        Self::drive(&self.path, false);
    }

    fn pulse(&mut self, on_ms: u64, off_ms: u64, count: u32) {
        if count == 0 {
            return;
        }
        self.pattern = Some(PulsePattern {
            on: Duration::from_millis(on_ms),
            off: Duration::from_millis(off_ms),
            remaining: count,
            lit: true,
            until: None,
        });
        Self::drive(&self.path, true);
    }

    fn tick(&mut self, now: Instant) {
        let mut finished = false;
        if let Some(pattern) = self.pattern.as_mut() {
            let deadline = *pattern.until.get_or_insert(now + pattern.on);
            if now >= deadline {
                if pattern.lit {
                    pattern.lit = false;
                    pattern.remaining -= 1;
                    pattern.until = Some(now + pattern.off);
                    Self::drive(&self.path, false);
                    finished = pattern.remaining == 0;
                } else {
                    pattern.lit = true;
                    pattern.until = Some(now + pattern.on);
                    Self::drive(&self.path, true);
                }
            }
        }
        if finished {
            self.pattern = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn led_state(led: &SysfsLed) -> String {
        std::fs::read_to_string(&led.path).unwrap_or_default()
    }

    #[test]
    fn test_on_off() {
        let dir = tempfile::tempdir().unwrap();
        let mut led = SysfsLed::new(dir.path().join("brightness"));

        led.set_on();
        assert_eq!(led_state(&led), "1");
        led.set_off();
        assert_eq!(led_state(&led), "0");
    }

    #[test]
    fn test_triple_pulse_runs_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let mut led = SysfsLed::new(dir.path().join("brightness"));
        let t0 = Instant::now();

        led.pulse(200, 200, 3);
        assert_eq!(led_state(&led), "1");

        // first tick latches the deadline
        led.tick(t0);
        assert_eq!(led_state(&led), "1");

        let mut t = t0;
        for cycle in 0..3 {
            t += Duration::from_millis(200);
            led.tick(t);
            assert_eq!(led_state(&led), "0", "cycle {cycle} should go dark");
            t += Duration::from_millis(200);
            led.tick(t);
        }

        // pattern is finished: the final tick must not relight
        assert_eq!(led_state(&led), "0");
        led.tick(t + Duration::from_millis(200));
        assert_eq!(led_state(&led), "0");
    }

    #[test]
    fn test_set_on_cancels_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let mut led = SysfsLed::new(dir.path().join("brightness"));
        let t0 = Instant::now();

        led.pulse(100, 100, 5);
        led.tick(t0);
        led.set_on();
        led.tick(t0 + Duration::from_millis(500));
        assert_eq!(led_state(&led), "1");
    }
}
