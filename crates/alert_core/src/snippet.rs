/// Truncation glyph the alert mails insert inside snippets.
pub const ELLIPSIS: char = '…';

/// Remove every `…` and collapse whitespace runs to single spaces.
///
/// Idempotent: normalizing an already normalized snippet returns it unchanged.
pub fn normalize_snippet(raw: &str) -> String {
    raw.replace(ELLIPSIS, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
