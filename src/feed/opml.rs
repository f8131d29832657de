use std::collections::HashSet;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::storage::NewFeed;

/// Maximum nesting depth for `<outline>` elements. Deeper documents are
/// rejected rather than walked.
const MAX_OPML_DEPTH: usize = 50;

const UNTITLED_FEED: &str = "Untitled Feed";

#[derive(Debug, Error)]
pub enum OpmlError {
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("XML parse error: {0}")]
    XmlParse(String),
}

/// Extract feed descriptors from an OPML document.
///
/// Any `<outline>` carrying an `xmlUrl` counts, at any nesting depth; folder
/// outlines are walked but not returned. Never fails: malformed XML or an
/// over-deep document ends the walk and is reported in the second element,
/// alongside whatever descriptors were found before the problem.
pub fn parse_opml(content: &str) -> (Vec<NewFeed>, Vec<String>) {
    let mut feeds = Vec::new();
    let mut errors = Vec::new();

    if let Err(e) = walk_outlines(content, &mut feeds, &mut errors) {
        tracing::warn!(error = %e, found = feeds.len(), "OPML parsing stopped early");
        errors.push(e.to_string());
    }

    let mut seen = HashSet::new();
    feeds.retain(|feed: &NewFeed| seen.insert(feed.feed_url.clone()));

    (feeds, errors)
}

fn walk_outlines(
    content: &str,
    feeds: &mut Vec<NewFeed>,
    errors: &mut Vec<String>,
) -> Result<(), OpmlError> {
    // quick-xml does not expand <!ENTITY> declarations; only the five XML
    // builtins are resolved by decode_and_unescape_value().
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut depth: usize = 0;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                depth += 1;
                if depth > MAX_OPML_DEPTH {
                    return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH));
                }
                collect_outline(&e, &reader, feeds, errors);
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                collect_outline(&e, &reader, feeds, errors);
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpmlError::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn collect_outline(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    feeds: &mut Vec<NewFeed>,
    errors: &mut Vec<String>,
) {
    match outline_to_descriptor(e, reader) {
        Ok(Some(feed)) => feeds.push(feed),
        Ok(None) => {}
        Err(e) => errors.push(format!("Error parsing outline: {e}")),
    }
}

/// `None` for folder outlines (no `xmlUrl`, or an empty one).
fn outline_to_descriptor(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<Option<NewFeed>, quick_xml::Error> {
    let mut xml_url = None;
    let mut html_url = None;
    let mut title = None;
    let mut text = None;
    let mut description = None;

    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed OPML attribute");
                continue;
            }
        };
        let value = attr
            .decode_and_unescape_value(reader.decoder())?
            .trim()
            .to_string();
        match attr.key.as_ref() {
            b"xmlUrl" => xml_url = Some(value),
            b"htmlUrl" => html_url = Some(value),
            b"title" => title = Some(value),
            b"text" => text = Some(value),
            b"description" => description = Some(value),
            _ => {}
        }
    }

    let Some(feed_url) = xml_url.filter(|u| !u.is_empty()) else {
        return Ok(None);
    };

    let title = title
        .filter(|t| !t.is_empty())
        .or(text.filter(|t| !t.is_empty()))
        .unwrap_or_else(|| UNTITLED_FEED.to_string());

    Ok(Some(NewFeed {
        title,
        url: html_url.unwrap_or_default(),
        feed_url,
        description: Some(description.unwrap_or_default()),
    }))
}
