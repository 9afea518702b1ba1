//! Stripping the wake word from the front of an utterance.

/// What remained after looking for the wake word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeStrip {
    /// The wake word does not appear at all.
    Absent,
    /// Only the wake word (and an optional greeting) was said.
    OnlyWake,
    /// A command to dispatch.
    Command(String),
}

/// Look for `token` in `text`. A leading "hey"/"ok"/"okay" + token, or the
/// token alone, is removed along with surrounding punctuation. When the
/// token appears elsewhere the utterance is passed through as-is.
pub fn strip_wake(text: &str, token: &str) -> WakeStrip {
    let token = token.trim().to_lowercase();
    if token.is_empty() || !text.contains(&token) {
        return WakeStrip::Absent;
    }
    let prefixes = [
        format!("hey {token}"),
        format!("ok {token}"),
        format!("okay {token}"),
        token.clone(),
    ];
    let mut rest = text.trim();
    for prefix in &prefixes {
        if let Some(stripped) = rest.strip_prefix(prefix.as_str()) {
            rest = stripped;
            break;
        }
    }
    let rest = rest.trim_matches(|c: char| c.is_whitespace() || c == ',' || c == '.');
    if rest.is_empty() {
        WakeStrip::OnlyWake
    } else {
        WakeStrip::Command(rest.to_string())
    }
}
