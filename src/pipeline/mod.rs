//! Model-backed stages run after collection: validation, extraction, media
//! selection and the written report.
//!
//! The JSON stages (validation, extraction) degrade to empty results when the
//! model's reply cannot be decoded. A failed model call propagates and ends
//! the event run.

mod extraction;
mod media;
mod report;
mod validation;

pub use self::extraction::run_extraction;
pub use self::media::{build_sources, select_media, MEDIA_LIMIT};
pub use self::report::{minimal_report, run_report, MinimalReason};
pub use self::validation::{
    interpret, prepare_candidates, run_validation, Candidates, RejectedItem, ValidatedItem,
    ValidationResult,
};
