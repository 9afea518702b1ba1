//! Intent handlers, grouped by what they touch. Each file adds methods to
//! [`IntentRouter`](super::IntentRouter).

pub(super) mod chat;
pub(super) mod dev;
pub(super) mod files;
pub(super) mod media;
pub(super) mod system;
pub(super) mod web;

/// The text after the first of `prefixes` that `text` starts with, trimmed
/// and unquoted. Falls back to the whole text.
pub(super) fn after_prefix<'a>(text: &'a str, prefixes: &[&str]) -> &'a str {
    let rest = prefixes
        .iter()
        .find_map(|p| text.strip_prefix(p))
        .unwrap_or(text);
    rest.trim().trim_matches('"').trim()
}

/// The text after the first occurrence of any of `markers`, tried in order.
pub(super) fn after_marker<'a>(text: &'a str, markers: &[&str]) -> Option<&'a str> {
    markers
        .iter()
        .find_map(|m| text.find(m).map(|i| &text[i + m.len()..]))
        .map(str::trim)
}

/// Remove each phrase (as whole words) and collapse whitespace.
pub(super) fn strip_phrases(text: &str, phrases: &[&str]) -> String {
    let mut words: Vec<&str> = text.split_whitespace().collect();
    for phrase in phrases {
        let needle: Vec<&str> = phrase.split_whitespace().collect();
        if needle.is_empty() {
            continue;
        }
        let mut i = 0;
        while i + needle.len() <= words.len() {
            if words[i..i + needle.len()] == needle[..] {
                words.drain(i..i + needle.len());
            } else {
                i += 1;
            }
        }
    }
    words.join(" ")
}

/// Drop leading filler words such as "for" or "about".
pub(super) fn trim_leading_words<'a>(mut text: &'a str, fillers: &[&str]) -> &'a str {
    loop {
        let trimmed = text.trim_start();
        let next = fillers.iter().find_map(|f| {
            trimmed
                .strip_prefix(f)
                .filter(|rest| rest.is_empty() || rest.starts_with(' '))
        });
        match next {
            Some(rest) => text = rest,
            None => return trimmed.trim_end(),
        }
    }
}
