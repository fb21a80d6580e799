//! Error types and result handling for hondana operations.
//!
//! This module defines the error handling system used throughout the crate.
//! All fallible operations return a [`Result<T>`] which is a type alias for
//! `std::result::Result<T, Error>`.
//!
//! # Error Categories
//!
//! - **Network Errors**: Connection issues, timeouts, HTTP errors while talking to
//!   the remote catalog index or downloading packages
//! - **Parse Errors**: Invalid package manifests or index entries
//! - **Source Errors**: Failures reported by a content source
//! - **Not Found**: Missing sources, catalogs or chapters
//! - **Install Errors**: A catalog package could not be downloaded or installed
//! - **Uninstall Rejections**: The package removal was declined or failed
//! - **Storage Errors**: A chapter repository operation was refused
//! - **IO / JSON Errors**: File system and serialization failures
//!
//! Lookups that simply find nothing (an unregistered source, an unknown catalog) are
//! not errors: they return `None`. Installation failures never surface as `Err` either;
//! they end the install progress stream with [`InstallStep::Error`](crate::catalog::InstallStep::Error).
//!
//! # Examples
//!
//! ```rust
//! use hondana::error::{Error, Result};
//!
//! fn describe(result: Result<()>) -> String {
//!     match result {
//!         Ok(()) => "ok".to_string(),
//!         Err(Error::NotFound(what)) => format!("missing {}", what),
//!         Err(Error::UninstallRejected { pkg, .. }) => format!("{} is still installed", pkg),
//!         Err(e) => e.to_string(),
//!     }
//! }
//!
//! assert_eq!(describe(Err(Error::not_found("source 42"))), "missing source 42");
//! ```

use thiserror::Error;

/// Type alias for Results with hondana errors.
///
/// ```rust
/// use hondana::{Result, Error};
///
/// fn example_operation() -> Result<String> {
///     Ok("Success".to_string())
/// }
///
/// fn example_with_error() -> Result<()> {
///     Err(Error::parse("Something went wrong"))
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all hondana operations.
///
/// # Variants
///
/// * [`Network`](Error::Network) - HTTP client and connection errors
/// * [`Parse`](Error::Parse) - Data parsing and format errors
/// * [`Source`](Error::Source) - Source-specific errors with context
/// * [`NotFound`](Error::NotFound) - Missing resources
/// * [`RateLimit`](Error::RateLimit) - Rate limiting responses
/// * [`Install`](Error::Install) - Package download or installation failures
/// * [`UninstallRejected`](Error::UninstallRejected) - Package removal declined or failed
/// * [`Storage`](Error::Storage) - Chapter persistence failures
/// * [`Io`](Error::Io) - File system and IO errors
/// * [`Json`](Error::Json) - JSON serialization errors
/// * [`Other`](Error::Other) - Generic error messages
#[derive(Error, Debug)]
pub enum Error {
    /// Network-related errors from HTTP operations.
    ///
    /// Wraps errors from the underlying HTTP client (reqwest), such as connection
    /// timeouts, DNS failures and TLS errors.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Package manifest, index or other data format errors.
    ///
    /// ```rust
    /// use hondana::Error;
    ///
    /// let error = Error::parse("Missing pkg field in index entry");
    /// ```
    #[error("Parse error: {0}")]
    Parse(String),

    /// Source-specific errors with contextual information.
    ///
    /// # Fields
    ///
    /// * `src` - The identifier of the source that encountered the error
    /// * `message` - Descriptive error message explaining what went wrong
    #[error("Source error [{src}]: {message}")]
    Source { src: String, message: String },

    /// Resource not found errors.
    ///
    /// Used by operations that cannot continue without the resource, for example a
    /// chapter sync for a manga whose source is not registered.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limiting errors from remote servers.
    ///
    /// `retry_after` carries the `Retry-After` header value in seconds, when present.
    #[error("Rate limited, retry after {retry_after:?} seconds")]
    RateLimit { retry_after: Option<u64> },

    /// A catalog package could not be downloaded, validated or installed.
    ///
    /// This error stays inside the installer: the catalog repository turns it into a
    /// terminal [`InstallStep::Error`](crate::catalog::InstallStep::Error).
    ///
    /// ```rust
    /// use hondana::Error;
    ///
    /// let error = Error::install("eu.kanade.mangadex", "download timed out");
    /// assert_eq!(error.to_string(), "Install error [eu.kanade.mangadex]: download timed out");
    /// ```
    #[error("Install error [{pkg}]: {message}")]
    Install { pkg: String, message: String },

    /// Package removal was declined by the user or failed on the platform.
    ///
    /// When this is returned the installed catalog set is unchanged.
    #[error("Uninstall of {pkg} rejected: {reason}")]
    UninstallRejected { pkg: String, reason: String },

    /// A chapter repository refused or failed an operation.
    ///
    /// Multi-record operations that fail with this error leave no partial changes.
    #[error("Storage error: {0}")]
    Storage(String),

    /// File system and IO operation errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization and deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error messages.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Creates a parse error with the given message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Creates a source-specific error with source ID and message.
    ///
    /// ```rust
    /// use hondana::Error;
    ///
    /// let error = Error::source("mangadex", "API endpoint not found");
    /// ```
    pub fn source(src: impl ToString, msg: impl Into<String>) -> Self {
        Error::Source {
            src: src.to_string(),
            message: msg.into(),
        }
    }

    /// Creates a not found error with the given message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Creates a rate limit error with optional retry-after time.
    pub fn rate_limit(retry_after: Option<u64>) -> Self {
        Error::RateLimit { retry_after }
    }

    /// Creates an install error for the given package.
    pub fn install(pkg: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::Install {
            pkg: pkg.into(),
            message: msg.into(),
        }
    }

    /// Creates an uninstall rejection for the given package.
    pub fn uninstall_rejected(pkg: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::UninstallRejected {
            pkg: pkg.into(),
            reason: reason.into(),
        }
    }

    /// Creates a storage error with the given message.
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }
}
