// Driver input: stdin signals and the debounce policy

use std::io::{self, BufRead};
use std::sync::mpsc::Sender;
use std::time::Instant;

use log::{debug, warn};

/// A driver action after debouncing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverSignal {
    /// The lap button: close the current lap, start the next.
    LapBoundary,
    /// The mark button, meaningful on set laps.
    MarkReached,
    Reset,
    Quit,
}

/// Minimum-interval filter for the two timing buttons. The physical buttons
/// this replaces bounce; two presses inside the window count as one.
#[derive(Debug)]
pub struct Debounce {
    min_interval_s: f64,
    last_accepted: Option<Instant>,
}

impl Debounce {
    pub fn new(min_interval_s: f64) -> Self {
        Debounce {
            min_interval_s,
            last_accepted: None,
        }
    }

    /// Accept the press unless it follows the previous accepted one too
    /// closely. An accepted press restarts the window.
    pub fn accept(&mut self, now: Instant) -> bool {
        let accepted = match self.last_accepted {
            Some(last) => {
                now.saturating_duration_since(last).as_secs_f64() >= self.min_interval_s
            }
            None => true,
        };
        if accepted {
            self.last_accepted = Some(now);
        }
        accepted
    }
}

/// Map one input line to a signal. The bare return key is the lap button,
/// matching how the timer is driven one-handed; anything unrecognized is
/// dropped.
pub fn parse_line(line: &str) -> Option<DriverSignal> {
    match line.trim() {
        "" | "l" => Some(DriverSignal::LapBoundary),
        "m" => Some(DriverSignal::MarkReached),
        "r" => Some(DriverSignal::Reset),
        "q" => Some(DriverSignal::Quit),
        other => {
            debug!("Ignoring input line {:?}", other);
            None
        }
    }
}

/// Read driver signals from stdin and forward them until quit, EOF, or the
/// session loop hanging up. Lap and mark presses are debounced; reset and
/// quit always pass. A closed stdin counts as quit, so the session loop
/// still winds down instead of running headless forever.
pub fn read_signals(signal_sender: Sender<DriverSignal>, debounce_s: f64) {
    read_signals_from(io::stdin().lock(), signal_sender, debounce_s);
}

fn read_signals_from(input: impl BufRead, signal_sender: Sender<DriverSignal>, debounce_s: f64) {
    let mut debounce = Debounce::new(debounce_s);
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Could not read input line: {}", e);
                break;
            }
        };
        let signal = match parse_line(&line) {
            Some(signal) => signal,
            None => continue,
        };
        let timing_signal = matches!(
            signal,
            DriverSignal::LapBoundary | DriverSignal::MarkReached
        );
        if timing_signal && !debounce.accept(Instant::now()) {
            debug!("Debounced {:?}", signal);
            continue;
        }
        if signal_sender.send(signal).is_err() {
            return;
        }
        if signal == DriverSignal::Quit {
            return;
        }
    }
    // input ended without an explicit quit
    let _ = signal_sender.send(DriverSignal::Quit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_parse_line_keymap() {
        assert_eq!(parse_line(""), Some(DriverSignal::LapBoundary));
        assert_eq!(parse_line("l"), Some(DriverSignal::LapBoundary));
        assert_eq!(parse_line("  m "), Some(DriverSignal::MarkReached));
        assert_eq!(parse_line("r"), Some(DriverSignal::Reset));
        assert_eq!(parse_line("q"), Some(DriverSignal::Quit));
        assert_eq!(parse_line("x"), None);
        assert_eq!(parse_line("lap please"), None);
    }

    #[test]
    fn test_debounce_swallows_rapid_presses() {
        let mut debounce = Debounce::new(0.5);
        let base = Instant::now();

        assert!(debounce.accept(base));
        assert!(!debounce.accept(base + Duration::from_millis(200)));
        assert!(!debounce.accept(base + Duration::from_millis(400)));
        assert!(debounce.accept(base + Duration::from_millis(900)));
    }

    #[test]
    fn test_debounce_window_restarts_on_accept() {
        let mut debounce = Debounce::new(0.5);
        let base = Instant::now();

        assert!(debounce.accept(base));
        assert!(debounce.accept(base + Duration::from_millis(500)));
        // 400 ms after the second accepted press, not the first
        assert!(!debounce.accept(base + Duration::from_millis(900)));
    }

    #[test]
    fn test_zero_debounce_accepts_everything() {
        let mut debounce = Debounce::new(0.0);
        let base = Instant::now();
        assert!(debounce.accept(base));
        assert!(debounce.accept(base));
        assert!(debounce.accept(base + Duration::from_nanos(1)));
    }

    #[test]
    fn test_exhausted_input_sends_a_final_quit() {
        let (sender, receiver) = mpsc::channel();

        read_signals_from(Cursor::new("l\nx\nm\n"), sender, 0.0);

        let signals: Vec<DriverSignal> = receiver.iter().collect();
        assert_eq!(
            signals,
            vec![
                DriverSignal::LapBoundary,
                DriverSignal::MarkReached,
                DriverSignal::Quit
            ]
        );
    }

    #[test]
    fn test_quit_line_stops_reading_and_sends_one_quit() {
        let (sender, receiver) = mpsc::channel();

        read_signals_from(Cursor::new("q\nl\n"), sender, 0.0);

        let signals: Vec<DriverSignal> = receiver.iter().collect();
        assert_eq!(signals, vec![DriverSignal::Quit]);
    }
}
