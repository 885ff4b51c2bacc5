//! Traits for the collaborators timeshadow plugs into.

mod clock;
mod executor;
mod time_machine;

pub use clock::*;
pub use executor::*;
pub use time_machine::*;
