//! Shared model types for the scan pipeline.
//!
//! Every stage exchanges the immutable value types defined here: severities
//! and analyzer kinds, the [`Finding`] record, and the output masker that
//! guards every string leaving the pipeline.

pub mod finding;
pub mod masker;
pub mod severity;

pub use finding::{Finding, Location};
pub use masker::{contains_secret_shape, mask_secrets};
pub use severity::{AnalyzerKind, Severity};
