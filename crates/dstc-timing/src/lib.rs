mod duration;
mod instant;
mod nanos;
mod repeater;

pub use duration::Duration;
pub use instant::Instant;
pub use nanos::{Nanos, ParseNanosError};
pub use repeater::Repeater;
