// Confirmation-lap countdown: counts, marks, and the zero crossing

use std::fmt;

use super::reference::{FrozenReference, MarkPoint};

/// A cue for the driver during a confirmation lap.
#[derive(Clone, Debug, PartialEq)]
pub enum Announcement {
    /// Whole seconds remaining to the set time.
    Count(u32),
    /// A mark captured on the set lap is due.
    Mark(String),
    /// The set time has been reached.
    Zero,
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Announcement::Count(value) => write!(f, "{value}"),
            Announcement::Mark(label) => write!(f, "{label}"),
            Announcement::Zero => write!(f, "time"),
        }
    }
}

/// Announcement schedule for one confirmation lap, rebuilt from the frozen
/// reference every time a confirmation lap starts.
///
/// Counts and marks are independent streams, each consumed front to back as
/// the remaining time falls through their thresholds. A slow tick that falls
/// through several thresholds at once releases them all, still in descending
/// threshold order, and nothing ever fires twice. The zero call latches on
/// the first tick at or past the set time.
#[derive(Clone, Debug)]
pub struct CountdownState {
    /// Pending counts, ascending; the last element is next to fire.
    pending_counts: Vec<u32>,
    marks: Vec<MarkPoint>,
    next_mark: usize,
    zero_fired: bool,
    lead_s: f64,
}

impl CountdownState {
    pub(crate) fn new(reference: &FrozenReference, countdown_from: u32, lead_s: f64) -> Self {
        CountdownState {
            pending_counts: (1..=countdown_from).collect(),
            marks: reference.marks.clone(),
            next_mark: 0,
            zero_fired: false,
            lead_s,
        }
    }

    /// Release every announcement due at `remaining_s` seconds to the set
    /// time. Counts fire `lead_s` early to cover speaker latency; marks and
    /// the zero call fire on their exact thresholds.
    pub(crate) fn evaluate(&mut self, remaining_s: f64) -> Vec<Announcement> {
        let mut due = Vec::new();

        while let Some(&count) = self.pending_counts.last() {
            if remaining_s <= f64::from(count) + self.lead_s {
                self.pending_counts.pop();
                due.push(Announcement::Count(count));
            } else {
                break;
            }
        }

        while let Some(mark) = self.marks.get(self.next_mark) {
            if remaining_s <= mark.threshold_s {
                due.push(Announcement::Mark(mark.label.clone()));
                self.next_mark += 1;
            } else {
                break;
            }
        }

        if remaining_s <= 0.0 && !self.zero_fired {
            self.zero_fired = true;
            due.push(Announcement::Zero);
        }

        due
    }

    /// The mark that will be announced next, if any are left.
    pub(crate) fn next_mark_point(&self) -> Option<&MarkPoint> {
        self.marks.get(self.next_mark)
    }
}
