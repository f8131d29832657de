//! Small helpers shared across modules.
//!
//! - **URL validation**: scheme and SSRF checks for subscription URLs

mod url_validator;

pub use url_validator::{validate_feed_url, UrlValidationError};
