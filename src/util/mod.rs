//! Shared helpers for outbound URL handling.
//!
//! Every URL the subscriber fetches or posts to (topic resources during
//! discovery, hubs during subscription) passes through [`validate_url`] first.

mod url_validator;

pub use url_validator::{validate_url, NetworkPolicy, UrlValidationError};
