//! SQLite event store: the external table of thresholded rain events.
mod core;
mod events;
mod schema;

pub use self::core::{EventStore, EventTable};
pub use self::events::select_pending;
