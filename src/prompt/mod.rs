mod common;
mod extraction;
mod report;
mod validation;

pub use common::*;
pub use extraction::extraction_messages;
pub use report::{report_messages, SourceRecord, SourceType};
pub use validation::validation_messages;
