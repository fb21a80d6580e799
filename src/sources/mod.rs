//! Bundled source implementations with conditional compilation support.
//!
//! Sources shipped inside the crate back the internal catalogs: they are always
//! available and never go through the package installer. Each one is protected by a
//! feature flag so that builds can leave them out.
//!
//! # Feature Flags
//!
//! - `test-source` - Enables [`TestSource`], a deterministic offline source (default)
//!
//! ```bash
//! cargo build --no-default-features
//! ```

#[cfg(feature = "test-source")]
pub mod test_source;

#[cfg(feature = "test-source")]
pub use test_source::TestSource;
