use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    sync::mpsc::Receiver,
};

use log::error;
use serde::{Deserialize, Serialize};

use crate::{
    config::RallyConfig,
    errors::PacenoteError,
    session::{FrozenReference, LapType},
};

/// One line of the session log, JSON per line.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SessionRecord {
    /// The config in force, written when the session starts and again on
    /// every reset or reload.
    SessionStart { config: RallyConfig },
    /// The reference frozen by a completed set lap: the set time and the
    /// mark thresholds confirmation laps will replay.
    Reference(FrozenReference),
    Lap(LapRecord),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LapRecord {
    pub lap_no: usize,
    /// The type the lap actually ran as, overrides included.
    pub lap_type: LapType,
    pub seconds: f64,
}

/// Drain session records off the channel into the log file until the session
/// loop hangs up.
pub fn write_session(
    file: &PathBuf,
    record_receiver: Receiver<SessionRecord>,
) -> Result<(), PacenoteError> {
    let session_file = File::create(file).map_err(|e| PacenoteError::WriterError { source: e })?;
    let mut session_writer = BufWriter::new(session_file);
    for record in &record_receiver {
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                error!("Could not serialize session record: {}", e);
                continue;
            }
        };
        if let Err(e) = writeln!(session_writer, "{}", line) {
            error!("Error while writing session record: {}", e);
        }
    }
    session_writer
        .flush()
        .map_err(|e| PacenoteError::WriterError { source: e })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MarkPoint;
    use std::io::Read;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_write_session_produces_one_json_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        let (sender, receiver) = mpsc::channel();

        let config = RallyConfig::parse("34\n").unwrap();
        sender
            .send(SessionRecord::SessionStart { config })
            .unwrap();
        sender
            .send(SessionRecord::Lap(LapRecord {
                lap_no: 1,
                lap_type: LapType::SetLap,
                seconds: 92.413,
            }))
            .unwrap();
        sender
            .send(SessionRecord::Reference(FrozenReference {
                set_duration_s: 92.413,
                marks: vec![
                    MarkPoint {
                        label: "bridge".to_string(),
                        offset_s: 30.5,
                        threshold_s: 61.913,
                    },
                    MarkPoint {
                        label: "hairpin".to_string(),
                        offset_s: 88.0,
                        threshold_s: 4.413,
                    },
                ],
            }))
            .unwrap();
        drop(sender);

        let writer_path = path.clone();
        thread::spawn(move || write_session(&writer_path, receiver))
            .join()
            .unwrap()
            .unwrap();

        let mut contents = String::new();
        File::open(&path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);

        let first: SessionRecord = serde_json::from_str(lines[0]).unwrap();
        assert!(matches!(first, SessionRecord::SessionStart { .. }));
        let second: SessionRecord = serde_json::from_str(lines[1]).unwrap();
        match second {
            SessionRecord::Lap(lap) => {
                assert_eq!(lap.lap_no, 1);
                assert_eq!(lap.lap_type, LapType::SetLap);
                assert!((lap.seconds - 92.413).abs() < 1e-9);
            }
            other => panic!("unexpected record: {other:?}"),
        }
        let third: SessionRecord = serde_json::from_str(lines[2]).unwrap();
        match third {
            SessionRecord::Reference(reference) => {
                assert!((reference.set_duration_s - 92.413).abs() < 1e-9);
                assert_eq!(reference.marks.len(), 2);
                assert_eq!(reference.marks[0].label, "bridge");
                assert!((reference.marks[1].threshold_s - 4.413).abs() < 1e-9);
            }
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[test]
    fn test_write_session_fails_on_bad_path() {
        let (sender, receiver) = mpsc::channel::<SessionRecord>();
        drop(sender);
        let result = write_session(&PathBuf::from("/nonexistent/dir/session.jsonl"), receiver);
        assert!(matches!(result, Err(PacenoteError::WriterError { .. })));
    }
}
