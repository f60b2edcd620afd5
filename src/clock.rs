// clock.rs

use crate::midi::TICKS_PER_BEAT;
use log::{info, trace};
use std::time::{Duration, Instant};

/// Fixed tempo configuration the tick interval is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSchedule {
    tempo_bpm: u32,
    ticks_per_quarter: u32,
}

impl ClockSchedule {
    /// Panics on a zero tempo.
    pub fn new(tempo_bpm: u32) -> Self {
        assert!(tempo_bpm > 0, "tempo must be positive");
        Self {
            tempo_bpm,
            ticks_per_quarter: TICKS_PER_BEAT,
        }
    }

    pub fn tempo_bpm(&self) -> u32 {
        self.tempo_bpm
    }

    pub fn ticks_per_quarter(&self) -> u32 {
        self.ticks_per_quarter
    }

    /// 60_000_000 / (bpm * ppq), truncated to whole microseconds.
    pub fn interval_us(&self) -> u64 {
        60_000_000 / (u64::from(self.tempo_bpm) * u64::from(self.ticks_per_quarter))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_micros(self.interval_us())
    }
}

/// Polled tick source.
///
/// Deadlines accumulate (`deadline += interval`) rather than being reset from
/// the poll time, so polling jitter never turns into drift. A late poll yields
/// one tick per call; the missed ticks replay on the following polls.
#[derive(Debug)]
pub struct ClockGenerator {
    schedule: ClockSchedule,
    interval_us: u64,
    next_deadline_us: u64,
    origin: Instant,
    ticks_emitted: u64,
}

impl ClockGenerator {
    pub fn new(schedule: ClockSchedule) -> Self {
        let interval_us = schedule.interval_us();
        info!(
            "Clock generator at {} BPM, tick interval {} µs",
            schedule.tempo_bpm(),
            interval_us
        );
        Self {
            schedule,
            interval_us,
            next_deadline_us: interval_us,
            origin: Instant::now(),
            ticks_emitted: 0,
        }
    }

    pub fn schedule(&self) -> ClockSchedule {
        self.schedule
    }

    /// Polls against the monotonic clock.
    pub fn tick(&mut self) -> bool {
        let now_us = self.origin.elapsed().as_micros() as u64;
        self.tick_at(now_us)
    }

    /// Polls with an explicit time in microseconds since the generator was
    /// created.
    pub fn tick_at(&mut self, now_us: u64) -> bool {
        if now_us < self.next_deadline_us {
            return false;
        }
        self.next_deadline_us += self.interval_us;
        self.ticks_emitted += 1;
        trace!("tick {} at {} µs", self.ticks_emitted, now_us);
        true
    }

    pub fn ticks_emitted(&self) -> u64 {
        self.ticks_emitted
    }

    /// Time left until the next deadline, zero when a tick is already due.
    pub fn until_next(&self) -> Duration {
        let now_us = self.origin.elapsed().as_micros() as u64;
        Duration::from_micros(self.next_deadline_us.saturating_sub(now_us))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_at_120_bpm() {
        let schedule = ClockSchedule::new(120);
        assert_eq!(schedule.ticks_per_quarter(), 24);
        assert_eq!(schedule.interval_us(), 20_833);
    }

    #[test]
    fn test_no_tick_before_first_interval() {
        let mut clock = ClockGenerator::new(ClockSchedule::new(120));
        assert!(!clock.tick_at(0));
        assert!(!clock.tick_at(20_832));
        assert!(clock.tick_at(20_833));
        assert!(!clock.tick_at(20_834));
    }

    #[test]
    fn test_stall_replays_one_tick_per_poll() {
        let mut clock = ClockGenerator::new(ClockSchedule::new(120));
        let late = 20_833 * 5 + 100;
        let mut emitted = 0;
        for _ in 0..10 {
            if clock.tick_at(late) {
                emitted += 1;
            }
        }
        assert_eq!(emitted, 5);
        assert_eq!(clock.ticks_emitted(), 5);
    }

    #[test]
    #[should_panic(expected = "tempo must be positive")]
    fn test_zero_tempo_panics() {
        let _ = ClockSchedule::new(0);
    }
}
