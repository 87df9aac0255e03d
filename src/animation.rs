// animation.rs - Frame Clock and Animation Timer
//
// AnimationClock decides when the current frame's duration has elapsed.
// AnimationTimer is the scheduled tick task: the event loop sleeps until its
// deadline and hands the token back when it wakes. Cancelling or restarting
// the timer bumps the generation, so a wakeup scheduled before that is
// recognized as stale and dropped.

use std::time::{Duration, Instant};

use crate::constants::speed;
use crate::media::Frame;

/// Tracks time spent on the current frame
#[derive(Debug, Clone, Default)]
pub struct AnimationClock {
    elapsed_in_frame: Duration,
}

impl AnimationClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget partial progress; the next frame starts fresh
    pub fn reset(&mut self) {
        self.elapsed_in_frame = Duration::ZERO;
    }

    /// Advance `index` through `frames` by `elapsed` of wall time at
    /// `speed_percent` (100 = native speed). Returns true if the index moved.
    pub fn advance(
        &mut self,
        frames: &[Frame],
        index: &mut usize,
        elapsed: Duration,
        speed_percent: u32,
    ) -> bool {
        if frames.len() < 2 {
            return false;
        }

        self.elapsed_in_frame += scale_elapsed(elapsed, speed_percent);

        let mut moved = false;
        while let Some(duration) = frames.get(*index).and_then(Frame::duration) {
            if duration.is_zero() || self.elapsed_in_frame < duration {
                break;
            }
            self.elapsed_in_frame -= duration;
            *index = (*index + 1) % frames.len();
            moved = true;
        }
        moved
    }
}

fn scale_elapsed(elapsed: Duration, speed_percent: u32) -> Duration {
    let speed_percent = speed_percent.clamp(speed::MIN, speed::MAX);
    if speed_percent == 100 {
        return elapsed;
    }
    let nanos = elapsed.as_nanos() * u128::from(speed_percent) / 100;
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Identifies one arming of the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken(u64);

#[derive(Debug, Clone, Copy)]
struct Armed {
    token: TimerToken,
    next: Instant,
    last: Instant,
}

/// Fixed-rate timer driving `OverlayController::tick`
#[derive(Debug, Clone)]
pub struct AnimationTimer {
    interval: Duration,
    generation: u64,
    armed: Option<Armed>,
}

impl AnimationTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            generation: 0,
            armed: None,
        }
    }

    /// Arm (or re-arm) the timer. Any earlier token becomes stale.
    pub fn start(&mut self, now: Instant) -> TimerToken {
        self.generation += 1;
        let token = TimerToken(self.generation);
        self.armed = Some(Armed {
            token,
            next: now + self.interval,
            last: now,
        });
        token
    }

    /// Disarm the timer. Outstanding tokens become stale.
    pub fn cancel(&mut self) {
        if self.armed.take().is_some() {
            self.generation += 1;
        }
    }

    pub fn is_running(&self) -> bool {
        self.armed.is_some()
    }

    /// The token and deadline of the next firing, if armed
    pub fn scheduled(&self) -> Option<(TimerToken, Instant)> {
        self.armed.map(|a| (a.token, a.next))
    }

    pub fn is_current(&self, token: TimerToken) -> bool {
        self.armed.is_some_and(|a| a.token == token)
    }

    /// Fire the timer if `token` is current and the deadline has passed.
    /// Returns the wall time elapsed since the previous firing.
    pub fn fire(&mut self, token: TimerToken, now: Instant) -> Option<Duration> {
        let armed = self.armed.as_mut()?;
        if armed.token != token || now < armed.next {
            return None;
        }

        let elapsed = now.saturating_duration_since(armed.last);
        armed.last = now;
        armed.next = now + self.interval;
        Some(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn frames(durations_ms: &[u64]) -> Vec<Frame> {
        durations_ms
            .iter()
            .map(|&ms| Frame::from_rgba(RgbaImage::new(1, 1), Some(Duration::from_millis(ms))))
            .collect()
    }

    fn run(clock: &mut AnimationClock, frames: &[Frame], index: &mut usize, total_ms: u64, speed: u32) {
        for _ in 0..total_ms / 10 {
            clock.advance(frames, index, Duration::from_millis(10), speed);
        }
    }

    #[test]
    fn three_frames_at_250_and_350_ms() {
        let frames = frames(&[100, 100, 100]);
        let mut clock = AnimationClock::new();
        let mut index = 0;

        run(&mut clock, &frames, &mut index, 250, 100);
        assert_eq!(index, 2);

        run(&mut clock, &frames, &mut index, 100, 100);
        assert_eq!(index, 0);
    }

    #[test]
    fn wraps_after_n_advances() {
        let frames = frames(&[30, 50, 20, 40]);
        let mut clock = AnimationClock::new();
        let mut index = 0;
        let mut advances = 0;
        while advances < frames.len() {
            if clock.advance(&frames, &mut index, Duration::from_millis(10), 100) {
                advances += 1;
            }
        }
        assert_eq!(index, 0);
    }

    #[test]
    fn large_step_skips_several_frames() {
        let frames = frames(&[100, 100, 100]);
        let mut clock = AnimationClock::new();
        let mut index = 0;
        assert!(clock.advance(&frames, &mut index, Duration::from_millis(210), 100));
        assert_eq!(index, 2);
    }

    #[test]
    fn single_frame_never_advances() {
        let frames = frames(&[100]);
        let mut clock = AnimationClock::new();
        let mut index = 0;
        assert!(!clock.advance(&frames, &mut index, Duration::from_secs(5), 100));
        assert_eq!(index, 0);
    }

    #[test]
    fn double_speed_halves_frame_time() {
        let frames = frames(&[100, 100, 100]);
        let mut clock = AnimationClock::new();
        let mut index = 0;
        run(&mut clock, &frames, &mut index, 100, 200);
        assert_eq!(index, 2);
    }

    #[test]
    fn timer_fires_only_when_due_and_current() {
        let start = Instant::now();
        let mut timer = AnimationTimer::new(Duration::from_millis(10));
        let token = timer.start(start);

        assert_eq!(timer.fire(token, start + Duration::from_millis(5)), None);
        assert_eq!(
            timer.fire(token, start + Duration::from_millis(12)),
            Some(Duration::from_millis(12))
        );
        let (_, next) = timer.scheduled().unwrap();
        assert_eq!(next, start + Duration::from_millis(22));
    }

    #[test]
    fn cancel_and_restart_invalidate_old_tokens() {
        let start = Instant::now();
        let later = start + Duration::from_secs(1);
        let mut timer = AnimationTimer::new(Duration::from_millis(10));

        let first = timer.start(start);
        timer.cancel();
        assert!(!timer.is_running());
        assert_eq!(timer.fire(first, later), None);

        let second = timer.start(start);
        assert_ne!(first, second);
        assert!(!timer.is_current(first));
        assert!(timer.is_current(second));
        assert!(timer.fire(second, later).is_some());
    }
}
