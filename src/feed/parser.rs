use chrono::{DateTime, Utc};
use feed_rs::parser;

/// One entry as delivered by an RSS/Atom document, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

/// Parse an RSS or Atom document, keeping the source's entry order.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedEntry>, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| FeedEntry {
            title: entry.title.map(|t| t.content),
            link: entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .filter(|href| !href.is_empty()),
            summary: entry.summary.map(|s| s.content),
            content: entry.content.and_then(|c| c.body),
            published: entry.published,
        })
        .collect();

    Ok(entries)
}
