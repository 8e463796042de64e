// Rally config files: the lap sequence plus mark and misc options

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::errors::PacenoteError;
use crate::session::LapType;

pub const DEFAULT_DEBOUNCE_S: f64 = 0.5;
pub const DEFAULT_SOUND_LEAD_S: f64 = 0.0;
pub const DEFAULT_COUNTDOWN_FROM: u32 = 10;
pub const DEFAULT_REFRESH_RATE_MS: u64 = 100;

const CONFIG_DIR_NAME: &str = "pacenote";
const CONFIG_EXTENSION: &str = "rally";

const MAX_SANE_COUNTDOWN_FROM: u32 = 60;

/// Options from the `[misc]` section. Every field has a default, so the
/// section is optional.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiscOptions {
    /// Minimum seconds between two accepted driver signals.
    pub debounce_s: f64,
    /// Seconds to announce each count early, to cover speaker latency.
    pub sound_lead_s: f64,
    /// First number of the confirmation-lap countdown.
    pub countdown_from: u32,
    /// Display refresh interval for the session loop.
    pub refresh_rate_ms: u64,
}

impl Default for MiscOptions {
    fn default() -> Self {
        Self {
            debounce_s: DEFAULT_DEBOUNCE_S,
            sound_lead_s: DEFAULT_SOUND_LEAD_S,
            countdown_from: DEFAULT_COUNTDOWN_FROM,
            refresh_rate_ms: DEFAULT_REFRESH_RATE_MS,
        }
    }
}

/// A mark declared in the `[marks]` section. The offset is a planning
/// placeholder: the offsets that actually drive the countdown are measured on
/// the set lap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkDef {
    pub label: String,
    pub offset_s: Option<f64>,
}

/// A parsed rally config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RallyConfig {
    pub sequence: Vec<LapType>,
    pub marks: Vec<MarkDef>,
    pub misc: MiscOptions,
}

enum Section {
    None,
    Marks,
    Misc,
    Unknown,
}

impl RallyConfig {
    /// Parse a rally config from text.
    ///
    /// The first significant line is the lap sequence, one digit per lap:
    /// `1` fast, `2` untimed, `3` set, `4` confirmation. `[marks]` and
    /// `[misc]` sections follow with `key = value` lines; unknown sections
    /// and options are ignored with a warning. `#` and `;` start comments.
    ///
    /// ```text
    /// 2341
    ///
    /// [marks]
    /// bridge =
    /// hairpin = 42.0
    ///
    /// [misc]
    /// debounce = 0.5
    /// sound_lead = 1.0
    /// ```
    pub fn parse(text: &str) -> Result<Self, PacenoteError> {
        let mut sequence: Vec<LapType> = Vec::new();
        let mut have_sequence = false;
        let mut marks: Vec<MarkDef> = Vec::new();
        let mut misc = MiscOptions::default();
        let mut section = Section::None;

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if !have_sequence {
                sequence = parse_sequence(line, line_no)?;
                have_sequence = true;
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                section = match &line[1..line.len() - 1] {
                    "marks" => Section::Marks,
                    "misc" => Section::Misc,
                    other => {
                        warn!("Ignoring unknown rally config section [{}]", other);
                        Section::Unknown
                    }
                };
                continue;
            }

            let (key, value) = match line.split_once('=') {
                Some((key, value)) => (key.trim(), value.trim()),
                None => {
                    warn!("Ignoring rally config line {}: {:?}", line_no, line);
                    continue;
                }
            };

            match section {
                Section::Marks => marks.push(MarkDef {
                    label: key.to_string(),
                    offset_s: parse_mark_offset(key, value),
                }),
                Section::Misc => apply_misc_option(&mut misc, key, value, line_no)?,
                Section::None => {
                    warn!(
                        "Ignoring rally config line {} before any section: {:?}",
                        line_no, line
                    );
                }
                Section::Unknown => {}
            }
        }

        if !have_sequence {
            return Err(PacenoteError::ConfigFormatError {
                line: 0,
                reason: "missing lap sequence line".to_string(),
            });
        }

        Ok(RallyConfig {
            sequence,
            marks,
            misc,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, PacenoteError> {
        let text = fs::read_to_string(path).map_err(|e| PacenoteError::ConfigIOError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&text)
    }

    /// Resolve a config argument. A path that exists wins; otherwise the
    /// argument is treated as a config name in the pacenote config directory.
    pub fn resolve_path(arg: &Path) -> Result<PathBuf, PacenoteError> {
        if arg.exists() {
            return Ok(arg.to_path_buf());
        }
        let config_dir = dirs::config_dir()
            .ok_or(PacenoteError::NoConfigDir)?
            .join(CONFIG_DIR_NAME);
        Ok(config_dir.join(arg).with_extension(CONFIG_EXTENSION))
    }

    /// Labels in declaration order, paired with set-lap mark signals by index.
    pub fn mark_labels(&self) -> Vec<String> {
        self.marks.iter().map(|mark| mark.label.clone()).collect()
    }

    /// Plausibility checks that do not make a config unusable. `pacenote
    /// check` prints these; loading a config logs them.
    pub fn lint(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let mut seen_set_lap = false;
        for (idx, lap_type) in self.sequence.iter().enumerate() {
            match lap_type {
                LapType::SetLap => seen_set_lap = true,
                LapType::ConfirmationLap if !seen_set_lap => warnings.push(format!(
                    "confirmation lap at position {} has no earlier set lap and will run without a countdown",
                    idx + 1
                )),
                _ => {}
            }
        }

        if !self.marks.is_empty() && !self.sequence.contains(&LapType::SetLap) {
            warnings.push("marks are configured but the sequence has no set lap".to_string());
        }
        if !self.misc.debounce_s.is_finite() {
            warnings
                .push("debounce is not a finite number, signals may never be accepted".to_string());
        } else if self.misc.debounce_s < 0.0 {
            warnings.push("debounce is negative, every signal will be accepted".to_string());
        }
        if !self.misc.sound_lead_s.is_finite() {
            warnings.push("sound lead is not a finite number, counts will never fire".to_string());
        }
        if self.misc.countdown_from > MAX_SANE_COUNTDOWN_FROM {
            warnings.push(format!(
                "counting down from {} will queue {} announcements on every confirmation lap",
                self.misc.countdown_from, self.misc.countdown_from
            ));
        }

        warnings
    }
}

fn parse_sequence(line: &str, line_no: usize) -> Result<Vec<LapType>, PacenoteError> {
    let mut sequence = Vec::with_capacity(line.len());
    for digit in line.chars() {
        match lap_type_for_digit(digit) {
            Some(lap_type) => sequence.push(lap_type),
            None => {
                return Err(PacenoteError::ConfigFormatError {
                    line: line_no,
                    reason: format!("'{}' is not a lap type digit (use 1-4)", digit),
                });
            }
        }
    }
    Ok(sequence)
}

fn lap_type_for_digit(digit: char) -> Option<LapType> {
    match digit {
        '1' => Some(LapType::FastLap),
        '2' => Some(LapType::UntimedLap),
        '3' => Some(LapType::SetLap),
        '4' => Some(LapType::ConfirmationLap),
        _ => None,
    }
}

fn parse_mark_offset(label: &str, value: &str) -> Option<f64> {
    if value.is_empty() {
        return None;
    }
    match value.parse::<f64>() {
        Ok(offset) if offset.is_finite() => Some(offset),
        _ => {
            warn!(
                "Mark {:?} has an unusable offset {:?}, treating it as unset",
                label, value
            );
            None
        }
    }
}

fn apply_misc_option(
    misc: &mut MiscOptions,
    key: &str,
    value: &str,
    line_no: usize,
) -> Result<(), PacenoteError> {
    match key {
        "debounce" => misc.debounce_s = parse_float(key, value, line_no)?,
        "sound_lead" => misc.sound_lead_s = parse_float(key, value, line_no)?,
        "countdown_from" => misc.countdown_from = parse_number(key, value, line_no)?,
        "refresh_rate_ms" => misc.refresh_rate_ms = parse_number(key, value, line_no)?,
        other => warn!("Ignoring unknown [misc] option {:?} at line {}", other, line_no),
    }
    Ok(())
}

fn parse_number<T: FromStr>(key: &str, value: &str, line_no: usize) -> Result<T, PacenoteError> {
    value.parse().map_err(|_| PacenoteError::ConfigFormatError {
        line: line_no,
        reason: format!("{} must be a number, got {:?}", key, value),
    })
}

// f64's FromStr accepts nan and inf, which would poison every comparison
// made against these options later.
fn parse_float(key: &str, value: &str, line_no: usize) -> Result<f64, PacenoteError> {
    let number: f64 = parse_number(key, value, line_no)?;
    if !number.is_finite() {
        return Err(PacenoteError::ConfigFormatError {
            line: line_no,
            reason: format!("{} must be finite, got {:?}", key, value),
        });
    }
    Ok(number)
}
