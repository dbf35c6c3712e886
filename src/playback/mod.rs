pub mod clock;
pub mod state;
pub(crate) mod worker;

pub use clock::PacingClock;
pub use state::{SourceState, StateProperty};
