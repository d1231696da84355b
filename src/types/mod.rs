//! Type definitions

pub mod messages;
pub mod takeoff;

pub use messages::*;
pub use takeoff::*;
