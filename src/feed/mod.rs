//! RSS/Atom feed adapter.
//!
//! - [`parser`] - feed-rs parsing into [`FeedEntry`] values
//! - [`fetcher`] - the [`FeedSource`] seam and its HTTP implementation
//! - [`opml`] - subscription list import

mod fetcher;
mod opml;
mod parser;

pub use fetcher::{FeedSource, HttpFeedSource};
pub use opml::{parse_opml, OpmlError};
pub use parser::{parse_feed, FeedEntry};
