//! Query planning: per-language keyword bundles and the channel table.

mod channels;
mod planner;

pub use self::channels::*;
pub use self::planner::*;
