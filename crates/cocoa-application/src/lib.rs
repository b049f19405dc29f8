//! Application layer for the Cocoa client.
//!
//! Coordinates the domain sessions with a transport: input debouncing,
//! stream lifetime, and publication of session snapshots to observers.

pub mod debounce;
pub mod session_controller;

pub use debounce::{DebouncedTrigger, Fired};
pub use session_controller::{ControllerEvent, SessionController, SessionSnapshot};
