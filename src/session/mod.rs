pub(crate) mod countdown;
pub(crate) mod lap_log;
pub(crate) mod reference;

use std::fmt;
use std::time::Instant;

pub use countdown::{Announcement, CountdownState};
pub use lap_log::LapLog;
pub use reference::{FrozenReference, MarkPoint, ReferenceCapture};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, MonotonicClock};
use crate::config::RallyConfig;
use crate::errors::PacenoteError;

/// The kinds of lap a regularity rally session cycles through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LapType {
    /// Configured but not yet started.
    Ready,
    /// Timed lap with no further role.
    FastLap,
    /// Timed lap excluded from scoring, usually a warm-up or transfer.
    UntimedLap,
    /// The lap whose duration and marks become the reference.
    SetLap,
    /// The lap driven against the reference, with the countdown running.
    ConfirmationLap,
}

impl fmt::Display for LapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LapType::Ready => write!(f, "Ready"),
            LapType::FastLap => write!(f, "Fast lap"),
            LapType::UntimedLap => write!(f, "Untimed lap"),
            LapType::SetLap => write!(f, "Set lap"),
            LapType::ConfirmationLap => write!(f, "Confirmation lap"),
        }
    }
}

/// What one pass of the session loop needs to render and announce.
#[derive(Clone, Debug, PartialEq)]
pub struct TickResult {
    /// Seconds into the current lap.
    pub elapsed_s: f64,
    /// Seconds left to the set time; only on confirmation laps with a
    /// reference, and negative once the set time has passed.
    pub countdown_s: Option<f64>,
    /// Announcements that came due on this tick, in speaking order.
    pub events: Vec<Announcement>,
}

/// One regularity rally timing session.
///
/// The session owns the whole lap state: the configured plan, the lap log,
/// the in-progress mark capture, the frozen reference, and the countdown for
/// the confirmation lap in progress. Driver signals arrive through
/// [`Session::advance`] and [`Session::mark_reached`]; the display loop polls
/// [`Session::tick`]. Nothing here blocks or talks to hardware, which keeps
/// the whole state machine testable with a [`crate::clock::ManualClock`].
pub struct Session {
    config: Option<RallyConfig>,
    current: LapType,
    /// Index into the lap sequence, `None` until the first boundary.
    position: Option<usize>,
    lap_log: LapLog,
    capture: ReferenceCapture,
    reference: Option<FrozenReference>,
    countdown: Option<CountdownState>,
    clock: Box<dyn Clock>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_clock(Box::new(MonotonicClock))
    }

    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        Session {
            config: None,
            current: LapType::Ready,
            position: None,
            lap_log: LapLog::default(),
            capture: ReferenceCapture::default(),
            countdown: None,
            reference: None,
            clock,
        }
    }

    /// Load a rally config, resetting any session in progress.
    pub fn load_config(&mut self, config: RallyConfig) -> Result<(), PacenoteError> {
        if config.sequence.is_empty() {
            return Err(PacenoteError::EmptySequence);
        }
        for warning in config.lint() {
            warn!("Rally config: {}", warning);
        }
        self.reset();
        self.config = Some(config);
        Ok(())
    }

    /// Record a lap boundary: close the lap in progress and start the next
    /// one from the plan.
    ///
    /// Returns the type of the lap just started and the duration of the lap
    /// just closed (`None` for the boundary that starts the session). Once
    /// the plan is exhausted every further lap is a fast lap.
    pub fn advance(&mut self) -> Result<(LapType, Option<f64>), PacenoteError> {
        self.advance_with_override(None)
    }

    /// [`Session::advance`], but force the type of the lap being started
    /// instead of taking it from the plan. The plan position still moves.
    pub fn advance_with_override(
        &mut self,
        requested: Option<LapType>,
    ) -> Result<(LapType, Option<f64>), PacenoteError> {
        let config = match self.config.as_ref() {
            Some(config) => config,
            None => return Err(PacenoteError::NotConfigured),
        };

        let now = self.clock.now();
        let ended = self.current;

        // The boundary instant goes into the log before anything else; the
        // raw record must survive whatever the rest of this does.
        let completed = self.lap_log.record_boundary(now);

        if ended == LapType::SetLap {
            if let (Some(set_duration_s), Some(lap_start)) =
                (completed, self.lap_log.previous_boundary())
            {
                let labels = config.mark_labels();
                let reference = self.capture.freeze(lap_start, set_duration_s, &labels);
                info!(
                    "Set lap locked in at {:.3} s with {} marks",
                    reference.set_duration_s,
                    reference.marks.len()
                );
                self.reference = Some(reference);
            }
        }

        let position = match self.position {
            Some(position) => position + 1,
            None => 0,
        };
        self.position = Some(position);

        let next = match requested {
            Some(lap_type) => lap_type,
            None => {
                if position == config.sequence.len() {
                    info!("Lap plan complete, continuing with fast laps");
                }
                config
                    .sequence
                    .get(position)
                    .copied()
                    .unwrap_or(LapType::FastLap)
            }
        };
        self.current = next;

        self.countdown = None;
        match next {
            LapType::SetLap => self.capture.begin_set_lap(),
            LapType::ConfirmationLap => match self.reference.as_ref() {
                Some(reference) => {
                    self.countdown = Some(CountdownState::new(
                        reference,
                        config.misc.countdown_from,
                        config.misc.sound_lead_s,
                    ));
                }
                None => {
                    warn!("Confirmation lap started without a set-lap reference, no countdown");
                }
            },
            _ => {}
        }

        Ok((next, completed))
    }

    /// Record a mark on the running set lap.
    pub fn mark_reached(&mut self) -> Result<(), PacenoteError> {
        if self.config.is_none() {
            return Err(PacenoteError::NotConfigured);
        }
        if self.current != LapType::SetLap {
            return Err(PacenoteError::NotOnSetLap {
                lap_type: self.current,
            });
        }
        let now = self.clock.now();
        self.capture.record_mark(now);
        debug!("Mark {} captured", self.capture.mark_count());
        Ok(())
    }

    /// Compute the elapsed lap time, the countdown, and any announcements
    /// due at `now`. `now` must come from the same clock the session was
    /// built with.
    pub fn tick(&mut self, now: Instant) -> TickResult {
        let elapsed_s = self.lap_log.elapsed_since_boundary(now);

        let mut countdown_s = None;
        let mut events = Vec::new();
        if self.current == LapType::ConfirmationLap {
            if let (Some(reference), Some(countdown)) =
                (self.reference.as_ref(), self.countdown.as_mut())
            {
                let remaining_s = reference.set_duration_s - elapsed_s;
                countdown_s = Some(remaining_s);
                events = countdown.evaluate(remaining_s);
            }
        }

        TickResult {
            elapsed_s,
            countdown_s,
            events,
        }
    }

    /// Drop every lap record and return to [`LapType::Ready`]. The loaded
    /// config survives, the frozen reference does not.
    pub fn reset(&mut self) {
        self.current = LapType::Ready;
        self.position = None;
        self.lap_log.clear();
        self.capture.clear();
        self.reference = None;
        self.countdown = None;
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    pub fn config(&self) -> Option<&RallyConfig> {
        self.config.as_ref()
    }

    pub fn current_lap_type(&self) -> LapType {
        self.current
    }

    pub fn lap_log(&self) -> &LapLog {
        &self.lap_log
    }

    pub fn reference(&self) -> Option<&FrozenReference> {
        self.reference.as_ref()
    }

    /// 1-based number of the lap in progress.
    pub fn lap_number(&self) -> usize {
        self.lap_log.lap_count() + 1
    }

    /// The lap type the plan holds at `index`, fast lap past the end.
    pub fn planned_lap_type(&self, index: usize) -> LapType {
        self.config
            .as_ref()
            .and_then(|config| config.sequence.get(index).copied())
            .unwrap_or(LapType::FastLap)
    }

    /// The next mark to expect: the next one to signal on a set lap, the
    /// next one due on a confirmation lap, `None` once they are exhausted
    /// or on laps without marks.
    pub fn next_mark_label(&self) -> Option<&str> {
        match self.current {
            LapType::SetLap => {
                let config = self.config.as_ref()?;
                config
                    .marks
                    .get(self.capture.mark_count())
                    .map(|mark| mark.label.as_str())
            }
            LapType::ConfirmationLap => {
                let countdown = self.countdown.as_ref()?;
                countdown.next_mark_point().map(|mark| mark.label.as_str())
            }
            _ => None,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
