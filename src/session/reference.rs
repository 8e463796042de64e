// Set-lap reference: captured mark instants frozen into countdown thresholds

use std::cmp::Ordering;
use std::time::Instant;

use itertools::Itertools;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::lap_log::seconds_since;

/// A mark from the set lap, replayable on confirmation laps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkPoint {
    pub label: String,
    /// Seconds into the set lap at which the mark was signaled.
    pub offset_s: f64,
    /// Seconds left to the set time when the mark comes due again. A mark
    /// signaled 2 s into an 8 s set lap is due with 6 s remaining.
    pub threshold_s: f64,
}

/// The target produced by a completed set lap: the duration to match and the
/// marks to call out along the way, ordered by ascending offset (descending
/// threshold).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrozenReference {
    pub set_duration_s: f64,
    pub marks: Vec<MarkPoint>,
}

/// Collects mark instants while a set lap runs. When the lap ends the
/// capture is frozen into a [`FrozenReference`]; starting another set lap
/// discards whatever was captured so far.
#[derive(Debug, Default)]
pub struct ReferenceCapture {
    mark_timestamps: Vec<Instant>,
}

impl ReferenceCapture {
    pub(crate) fn begin_set_lap(&mut self) {
        self.mark_timestamps.clear();
    }

    pub(crate) fn record_mark(&mut self, now: Instant) {
        self.mark_timestamps.push(now);
    }

    /// Marks signaled so far on the running set lap.
    pub fn mark_count(&self) -> usize {
        self.mark_timestamps.len()
    }

    pub(crate) fn clear(&mut self) {
        self.mark_timestamps.clear();
    }

    /// Convert the captured instants into offsets from the set-lap start and
    /// remaining-time thresholds against the set duration. Labels pair with
    /// signals by index; signals beyond the configured labels get generated
    /// names so no captured mark is dropped.
    pub(crate) fn freeze(
        &self,
        lap_start: Instant,
        set_duration_s: f64,
        labels: &[String],
    ) -> FrozenReference {
        let mut marks: Vec<MarkPoint> = Vec::with_capacity(self.mark_timestamps.len());
        for (idx, stamp) in self.mark_timestamps.iter().enumerate() {
            let offset_s = seconds_since(*stamp, lap_start);
            let label = match labels.get(idx) {
                Some(label) => label.clone(),
                None => {
                    debug!("Mark {} has no configured label", idx + 1);
                    format!("mark {}", idx + 1)
                }
            };
            marks.push(MarkPoint {
                label,
                offset_s,
                threshold_s: set_duration_s - offset_s,
            });
        }

        // Capture order is time order, so offsets must already be
        // non-decreasing; replay depends on it.
        let ordered = marks
            .windows(2)
            .all(|pair| pair[0].offset_s <= pair[1].offset_s);
        debug_assert!(ordered, "mark instants captured out of order");
        if !ordered {
            warn!("Mark offsets out of order, sorting before freezing");
        }
        let marks = marks
            .into_iter()
            .sorted_by(|a, b| {
                a.offset_s
                    .partial_cmp(&b.offset_s)
                    .unwrap_or(Ordering::Equal)
            })
            .collect();

        FrozenReference {
            set_duration_s,
            marks,
        }
    }
}
