//! Test utilities for the snapshot lifecycle.
//!
//! # Feature Flag
//!
//! This module is only available when the `testing` feature is enabled or during tests:
//!
//! ```toml
//! [dependencies]
//! lifecycle = { path = "../lifecycle", features = ["testing"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use lifecycle::testing::InMemoryProvider;
//!
//! let provider = InMemoryProvider::new()
//!     .with_region("us-east-1")
//!     .with_tagged_volume("us-east-1", "vol-1", "Snapper", Some("2.days"));
//! ```

mod memory;

pub use memory::{InMemoryProvider, ProviderCall};
