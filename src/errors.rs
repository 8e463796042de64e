// Error types for pacenote

use crate::session::{Announcement, LapType};
use snafu::Snafu;
use std::{io, sync::mpsc::SendError};

#[derive(Debug, Snafu)]
pub enum PacenoteError {
    // Errors from the timing session
    #[snafu(display("No rally config loaded, session cannot time laps"))]
    NotConfigured,
    #[snafu(display("Rally config has an empty lap sequence"))]
    EmptySequence,
    #[snafu(display("Marks can only be signaled on a set lap, current lap is {lap_type}"))]
    NotOnSetLap { lap_type: LapType },

    // Rally config file errors
    #[snafu(display("Unable to read rally config {path}"))]
    ConfigIOError { path: String, source: io::Error },
    #[snafu(display("Invalid rally config at line {line}: {reason}"))]
    ConfigFormatError { line: usize, reason: String },
    #[snafu(display("Could not find application data directory for rally configs"))]
    NoConfigDir,

    // Errors for the session log writer
    #[snafu(display("Error writing session log"))]
    WriterError { source: io::Error },

    // Errors while broadcasting announcements to the announcer
    #[snafu(display("Error broadcasting announcement"))]
    AnnounceBroadcastError {
        source: Box<SendError<Announcement>>,
    },
}

impl From<SendError<Announcement>> for PacenoteError {
    fn from(value: SendError<Announcement>) -> Self {
        PacenoteError::AnnounceBroadcastError {
            source: Box::new(value),
        }
    }
}
