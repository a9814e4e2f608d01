pub mod pending;
pub mod refresh_coordinator;
pub mod terminator;

pub use refresh_coordinator::RefreshCoordinator;
pub use terminator::{SessionEvent, SessionTerminator};
