//! Room playback coordination.
//!
//! A room freezes (snapshot and pause) its devices around listening windows,
//! interrupts them with clips, queues notifications behind each other, and
//! thaws back to what was playing before.

mod coordinator;
#[cfg(test)]
pub(crate) mod mock;
mod registry;
mod session;
mod snapshot;

pub use coordinator::{Room, RoomStatus};
pub use registry::RoomRegistry;
pub use session::{AudioSession, SessionHandle, SessionOutcome};
pub use snapshot::DeviceSnapshot;
