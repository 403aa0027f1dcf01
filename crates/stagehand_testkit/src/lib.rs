//! # Stagehand Testkit
//!
//! Test utilities for Stagehand.
//!
//! This crate provides:
//! - Staging fixtures over in-memory and temporary file stores
//! - Property-based test generators using proptest
//! - Concurrent staging stress helpers
//! - Test log initialisation
//!
//! ## Usage
//!
//! ```rust
//! use stagehand_testkit::prelude::*;
//! use stagehand_core::FilterRange;
//!
//! with_memory_staging(|staging| {
//!     let stream = "prices".into();
//!     staging.stage_rows(&stream, 0, 10);
//!     let staged = staging
//!         .index
//!         .get_incomplete(&stream, FilterRange::Unconstrained, 0, false, false)
//!         .unwrap();
//!     assert_eq!(staged.len(), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::init_test_logging;
pub use stress::*;
