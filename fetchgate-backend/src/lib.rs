// #![warn(missing_docs)]
//! Traits and structs for fetchgate store interaction.
//!
//! If you want to keep cached responses somewhere new, implement [`Store`].
mod backend;
mod error;

pub use backend::{Store, StoreResult};
pub use error::StoreError;

/// Status of deleting result.
#[derive(Debug, PartialEq, Eq)]
pub enum DeleteStatus {
    /// Record successfully deleted.
    Deleted(u32),
    /// Record already missing.
    Missing,
}
