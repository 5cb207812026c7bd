//! Two-tier storage for packed STT/translation results.

pub mod error;
pub mod models;
pub mod store;

pub use error::{ResultError, ResultResult};
pub use models::{lookup_text, ExportedResults, PackedResults, ResultEntry};
pub use store::ResultStore;
