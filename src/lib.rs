// Library interface for pacenote
// This allows integration tests to access internal modules

pub mod announce;
pub mod clock;
pub mod config;
pub mod display;
pub mod errors;
pub mod input;
pub mod session;
pub mod writer;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{MarkDef, MiscOptions, RallyConfig};
pub use errors::PacenoteError;
pub use session::{Announcement, FrozenReference, LapType, MarkPoint, Session, TickResult};
