// Time formatting and the two-line session display

use crate::session::{LapType, Session, TickResult};

/// Character width of the in-car display the frame layout is sized for.
pub const DISPLAY_WIDTH: usize = 16;

const EMPTY_TIME: &str = "--:--.-";
const EMPTY_COUNTDOWN: &str = "--.-";
const EMPTY_MARK: &str = "------";
const MARK_FIELD_WIDTH: usize = 6;

/// Two lines of [`DISPLAY_WIDTH`] characters each.
///
/// Line 1 holds the running lap time and the reference time: the set time on
/// a confirmation lap, the last completed lap otherwise. Line 2 holds the
/// countdown, the lap number, the lap-type character, and the next mark
/// label (`FINISH` once every mark has been passed).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayFrame {
    pub line1: String,
    pub line2: String,
}

/// Split seconds into hours, minutes, seconds, and milliseconds. Negative
/// values clamp to zero; lap times and references are never negative.
pub fn decode_seconds(seconds: f64) -> (u32, u32, u32, u32) {
    let total_ms = (seconds.max(0.0) * 1000.0).floor() as u64;
    let ms = (total_ms % 1000) as u32;
    let total_s = total_ms / 1000;
    (
        (total_s / 3600) as u32,
        ((total_s / 60) % 60) as u32,
        (total_s % 60) as u32,
        ms,
    )
}

/// `MM:SS.t`, the 7-character form used on the display lines.
pub fn format_compact(seconds: f64) -> String {
    let (_, minutes, secs, ms) = decode_seconds(seconds);
    format!("{:02}:{:02}.{}", minutes, secs, ms / 100)
}

/// `HH:MM:SS.mmm`, the full form used in lap listings and logs.
pub fn format_full(seconds: f64) -> String {
    let (hours, minutes, secs, ms) = decode_seconds(seconds);
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, ms)
}

/// One row of the lap listing.
pub fn format_lap_row(lap_no: usize, lap_type: LapType, seconds: f64) -> String {
    format!(
        "{:3}: {} {}",
        lap_no,
        format_full(seconds),
        type_letter(lap_type)
    )
}

/// The whole lap listing for the session so far.
pub fn format_lap_table(session: &Session) -> String {
    let mut table = String::new();
    for (idx, seconds) in session.lap_log().durations().iter().enumerate() {
        table.push_str(&format_lap_row(
            idx + 1,
            session.planned_lap_type(idx),
            *seconds,
        ));
        table.push('\n');
    }
    table
}

/// Compose the frame for the current tick.
pub fn compose_frame(session: &Session, tick: &TickResult) -> DisplayFrame {
    let mut lap_time = EMPTY_TIME.to_string();
    let mut ref_time = EMPTY_TIME.to_string();
    let mut countdown = EMPTY_COUNTDOWN.to_string();
    let mut lap_no = 0;
    let mut mark = EMPTY_MARK.to_string();
    let state = state_char(session);

    if session.lap_log().started() {
        lap_time = format_compact(tick.elapsed_s);
        lap_no = session.lap_number();

        if let Some(remaining_s) = tick.countdown_s {
            countdown = format_countdown(remaining_s);
            if let Some(reference) = session.reference() {
                ref_time = format_compact(reference.set_duration_s);
            }
        } else if let Some(last) = session.lap_log().last_duration() {
            ref_time = format_compact(last);
        }

        if matches!(
            session.current_lap_type(),
            LapType::SetLap | LapType::ConfirmationLap
        ) {
            mark = clip_label(session.next_mark_label().unwrap_or("FINISH"));
        }
    }

    DisplayFrame {
        line1: format!("{}  {}", lap_time, ref_time),
        line2: format!(
            "{} {:2} {} {:<width$}",
            countdown,
            lap_no,
            state,
            mark,
            width = MARK_FIELD_WIDTH
        ),
    }
}

/// `SS.t` with a leading zero, clamped so the field never outgrows its four
/// characters once the countdown runs far past the set time.
fn format_countdown(remaining_s: f64) -> String {
    format!("{:04.1}", remaining_s.clamp(-9.9, 99.9))
}

fn state_char(session: &Session) -> char {
    if !session.is_configured() {
        return 'o';
    }
    match session.current_lap_type() {
        LapType::Ready => 'x',
        LapType::FastLap => '*',
        LapType::UntimedLap => 'U',
        LapType::SetLap => 'S',
        LapType::ConfirmationLap => 'C',
    }
}

fn type_letter(lap_type: LapType) -> char {
    match lap_type {
        LapType::Ready => 'R',
        LapType::FastLap => 'F',
        LapType::UntimedLap => 'U',
        LapType::SetLap => 'S',
        LapType::ConfirmationLap => 'C',
    }
}

fn clip_label(label: &str) -> String {
    label.chars().take(MARK_FIELD_WIDTH).collect()
}
