//! Parser for `getRecordQueryInfo` responses.
//!
//! The device answers with a small XML document whose root element holds
//! one `items` child per recording:
//!
//! ```xml
//! <RecordQueryInfo>
//!   <items filepath="/mnt/sd/record/20240601/090507.mp4" filesize="10485760"
//!          record_mode="1" media_type="3" stream_index="0"
//!          start_time="2024-06-01 09:05:07" />
//! </RecordQueryInfo>
//! ```
//!
//! A body that is not well-formed XML is a [`ParseError`].  A well-formed
//! body with a broken `items` entry only loses that entry.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;
use tracing::{info, warn};

use jennov_common::protocol::{Recording, TIMESTAMP_FORMAT};

const ITEM_ELEMENT: &[u8] = b"items";

/// The response body as a whole could not be read.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("response has no root element")]
    NoRoot,

    #[error("unexpected content outside the root element")]
    TrailingContent,

    #[error("response ended inside an open element")]
    Truncated,
}

/// A single `items` entry that could not be turned into a [`Recording`].
#[derive(Debug, Error, PartialEq, Eq)]
enum ItemError {
    #[error("bad attribute: {0}")]
    Attribute(String),

    #[error("missing attribute '{0}'")]
    Missing(&'static str),

    #[error("empty filepath")]
    EmptyPath,

    #[error("invalid filesize '{0}'")]
    Size(String),

    #[error("invalid start_time '{0}'")]
    Timestamp(String),
}

/// One parsed page of query results.
#[derive(Debug, Default)]
pub struct QueryPage {
    pub recordings: Vec<Recording>,
    /// `items` entries the device returned but that were unusable.
    pub skipped: usize,
}

impl QueryPage {
    /// Number of entries the device returned, usable or not.  This is what
    /// the pagination cursor advances by.
    pub fn item_count(&self) -> usize {
        self.recordings.len() + self.skipped
    }
}

/// Parse one query response body.
pub fn parse_query_response(text: &str) -> Result<QueryPage, ParseError> {
    let mut reader = Reader::from_str(text);
    let mut page = QueryPage::default();
    let mut depth = 0usize;
    let mut seen_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if depth == 0 {
                    if seen_root {
                        return Err(ParseError::TrailingContent);
                    }
                    seen_root = true;
                } else if depth == 1 && e.name().as_ref() == ITEM_ELEMENT {
                    push_item(&mut page, &e);
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 0 {
                    if seen_root {
                        return Err(ParseError::TrailingContent);
                    }
                    seen_root = true;
                } else if depth == 1 && e.name().as_ref() == ITEM_ELEMENT {
                    push_item(&mut page, &e);
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Text(t) if depth == 0 => {
                if !t.iter().all(u8::is_ascii_whitespace) {
                    return Err(ParseError::TrailingContent);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(ParseError::Truncated);
    }
    if !seen_root {
        return Err(ParseError::NoRoot);
    }

    info!("Found {} recordings", page.recordings.len());
    Ok(page)
}

fn push_item(page: &mut QueryPage, element: &BytesStart<'_>) {
    match parse_item(element) {
        Ok(rec) => page.recordings.push(rec),
        Err(e) => {
            warn!("Skipping malformed recording entry: {e}");
            page.skipped += 1;
        }
    }
}

fn parse_item(element: &BytesStart<'_>) -> Result<Recording, ItemError> {
    let mut attrs: HashMap<String, String> = HashMap::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| ItemError::Attribute(e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| ItemError::Attribute(e.to_string()))?;
        attrs.insert(
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            value.into_owned(),
        );
    }

    let get = |key: &'static str| {
        attrs
            .get(key)
            .map(String::as_str)
            .ok_or(ItemError::Missing(key))
    };

    let remote_path = get("filepath")?;
    if remote_path.trim().is_empty() {
        return Err(ItemError::EmptyPath);
    }

    let size = get("filesize")?;
    let size_bytes: u64 = size
        .trim()
        .parse()
        .map_err(|_| ItemError::Size(size.to_string()))?;

    let start = get("start_time")?;
    let start_time = NaiveDateTime::parse_from_str(start.trim(), TIMESTAMP_FORMAT)
        .map_err(|_| ItemError::Timestamp(start.to_string()))?;

    Ok(Recording {
        remote_path: remote_path.to_string(),
        size_bytes,
        record_mode: get("record_mode")?.to_string(),
        media_type: get("media_type")?.to_string(),
        stream_index: get("stream_index")?.to_string(),
        start_time,
    })
}
