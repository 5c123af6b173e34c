//! Client-side event filtering for the Sentry backend.
//!
//! Events are kept when their message matches the configured filter
//! (exact text or regular expression) and their tags contain every
//! filter tag. With no message and no tags, every event matches.

use regex::Regex;
use tracing::debug;

use rollwatch_core::{Event, Tag};

use crate::error::QueryResult;

/// Parse `key=value` strings into tags.
///
/// Entries that do not split into exactly one key and one value are
/// dropped, never reported as errors.
pub fn parse_tags<S: AsRef<str>>(raw: &[S]) -> Vec<Tag> {
    raw.iter()
        .filter_map(|entry| {
            let entry = entry.as_ref();
            let parts: Vec<&str> = entry.split('=').collect();
            match parts.as_slice() {
                [key, value] => Some(Tag::new(*key, *value)),
                _ => {
                    debug!(tag = %entry, "provided tag is malformed, expected key=value");
                    None
                }
            }
        })
        .collect()
}

/// Filter `events` by message and tags, preserving input order.
///
/// With `use_regex`, `message` is compiled once and matched anywhere in each
/// event message; an invalid pattern fails the whole call. Without it, the
/// message must be equal, and an empty `message` accepts any text.
pub fn match_events(
    events: &[Event],
    message: &str,
    tags: &[Tag],
    use_regex: bool,
) -> QueryResult<Vec<Event>> {
    if message.is_empty() && tags.is_empty() {
        return Ok(events.to_vec());
    }

    let pattern = if use_regex {
        Some(Regex::new(message)?)
    } else {
        None
    };

    let matched = events
        .iter()
        .filter(|event| {
            let message_ok = match &pattern {
                Some(re) => re.is_match(&event.message),
                None => message.is_empty() || event.message == message,
            };
            message_ok && (tags.is_empty() || match_tags(tags, &event.tags))
        })
        .cloned()
        .collect();

    Ok(matched)
}

/// Whether `event_tags` contains every tag in `filter`.
///
/// Counts the (filter, event) pairs with equal key and value and requires
/// the count to equal `filter.len()`. Duplicates are not collapsed.
pub fn match_tags(filter: &[Tag], event_tags: &[Tag]) -> bool {
    let hits = event_tags
        .iter()
        .map(|candidate| filter.iter().filter(|wanted| *wanted == candidate).count())
        .sum::<usize>();
    hits == filter.len()
}
