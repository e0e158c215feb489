//! Shared test utilities for taxocr integration tests.
//!
//! - `TestHarness`: a temp upload directory, an in-memory job store, a
//!   scripted model and a fake page source wired into an `ExtractionWorker`
//! - builders for model replies and page sources

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
