// Append-only record of lap boundaries and derived lap durations

use std::time::Instant;

use log::error;

/// Raw boundary instants plus the durations derived from consecutive pairs.
/// Boundary `n` closes lap `n` and opens lap `n + 1`, so there is always one
/// more timestamp than there are durations once the session is under way.
#[derive(Debug, Default)]
pub struct LapLog {
    timestamps: Vec<Instant>,
    durations: Vec<f64>,
}

impl LapLog {
    /// Record a lap boundary and return the duration of the lap it closed,
    /// if it closed one. The instant is appended before the duration is
    /// derived so the raw record is never lost.
    pub(crate) fn record_boundary(&mut self, now: Instant) -> Option<f64> {
        self.timestamps.push(now);
        if self.timestamps.len() > 1 {
            let previous = self.timestamps[self.timestamps.len() - 2];
            let seconds = seconds_since(now, previous);
            self.durations.push(seconds);
            Some(seconds)
        } else {
            None
        }
    }

    /// Number of completed laps.
    pub fn lap_count(&self) -> usize {
        self.durations.len()
    }

    pub fn started(&self) -> bool {
        !self.timestamps.is_empty()
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn last_duration(&self) -> Option<f64> {
        self.durations.last().copied()
    }

    /// Start instant of the lap that the latest boundary closed.
    pub(crate) fn previous_boundary(&self) -> Option<Instant> {
        if self.timestamps.len() >= 2 {
            Some(self.timestamps[self.timestamps.len() - 2])
        } else {
            None
        }
    }

    /// Seconds into the lap currently running, zero before the first boundary.
    pub fn elapsed_since_boundary(&self, now: Instant) -> f64 {
        match self.timestamps.last() {
            Some(last) => seconds_since(now, *last),
            None => 0.0,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.timestamps.clear();
        self.durations.clear();
    }
}

/// Seconds from `earlier` to `now`. The session clock is monotonic, so a
/// backwards interval is a caller bug; it is clamped to zero in release
/// builds rather than poisoning the lap record.
pub(crate) fn seconds_since(now: Instant, earlier: Instant) -> f64 {
    debug_assert!(now >= earlier, "session clock went backwards");
    if now < earlier {
        error!("Session clock went backwards, clamping interval to zero");
        return 0.0;
    }
    now.duration_since(earlier).as_secs_f64()
}
