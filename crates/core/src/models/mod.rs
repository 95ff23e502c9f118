//! Data models for Waypoint

mod canvas;
mod participant;
mod pin;
mod trip;

pub use canvas::*;
pub use participant::*;
pub use pin::*;
pub use trip::*;
