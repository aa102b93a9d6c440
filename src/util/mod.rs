//! URL helpers shared by registration and feed parsing.

mod links;

pub use links::{resolve_link, validate_feed_url, UrlValidationError};
