// Announcement delivery: the voice of the countdown

use std::sync::mpsc::{Receiver, Sender};

use log::debug;

use crate::errors::PacenoteError;
use crate::session::Announcement;

/// Anything that can call announcements out to the driver. The session loop
/// only ever talks to the channel; implementations run on their own thread
/// so a slow speaker cannot stall the timing loop.
pub trait Announcer {
    fn announce(&mut self, announcement: &Announcement);
}

/// Announcer that prints to the terminal, with an optional bell on the
/// zero call.
#[derive(Debug, Default)]
pub struct ConsoleAnnouncer {
    pub bell: bool,
}

impl Announcer for ConsoleAnnouncer {
    fn announce(&mut self, announcement: &Announcement) {
        match announcement {
            Announcement::Count(value) => println!("\n{value}"),
            Announcement::Mark(label) => println!("\nmark: {label}"),
            Announcement::Zero => {
                if self.bell {
                    print!("\x07");
                }
                println!("\nTIME");
            }
        }
    }
}

/// Forward the announcements from one tick to the announcer thread.
pub fn dispatch(
    announcement_sender: &Sender<Announcement>,
    events: &[Announcement],
) -> Result<(), PacenoteError> {
    for event in events {
        announcement_sender.send(event.clone())?;
    }
    Ok(())
}

/// Drain announcements off the channel until the session loop hangs up.
pub fn run_announcer(mut announcer: impl Announcer, receiver: Receiver<Announcement>) {
    for announcement in &receiver {
        announcer.announce(&announcement);
    }
    debug!("Announcement channel closed");
}
