//! Time representation shared by the decoders and the pacing clock.
//! All time values are nanoseconds (i64).

pub mod time;

pub use time::{Time, ZERO};
