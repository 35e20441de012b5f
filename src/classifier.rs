//! Status classification for the reconciliation engine.
//!
//! Pure functions that decide what a remote status snapshot *is*: empty,
//! set by Herald itself, or foreign (set by the user or another tool).
//! Everything here is deterministic given the configuration and performs
//! no I/O, which is what makes the reconciler's gates testable in isolation.

use crate::config::RuntimeConfig;

/// Separator Herald writes between artist and track title.
///
/// Ownership detection keys on this literal substring, so it doubles as a
/// fingerprint: a status carrying the sentinel emoji plus a `" - "`-infixed
/// text is treated as ours.
pub const TRACK_SEPARATOR: &str = " - ";

/// Normalize a status field before any comparison.
///
/// Both the text and the emoji field go through this, so classification
/// never depends on surrounding whitespace the chat service may preserve.
#[must_use]
pub fn normalize(s: &str) -> &str {
    s.trim()
}

/// True iff both normalized fields are the empty string.
#[must_use]
pub fn is_empty(text: &str, emoji: &str) -> bool {
    normalize(text).is_empty() && normalize(emoji).is_empty()
}

/// True iff the snapshot looks like something Herald wrote.
///
/// The emoji must equal one of the configured sentinels (the ASCII code
/// form like `:headphones:` or the literal Unicode glyph), and the text
/// must be empty or contain the [`TRACK_SEPARATOR`] Herald itself formats.
///
/// This is a heuristic fingerprint, not a cryptographic tag. A foreign
/// status that happens to use the sentinel emoji with an "Artist - Title"
/// shaped text will be misclassified as owned; that false positive is
/// accepted, since the worst outcome is overwriting a status that already
/// looks exactly like a now-playing announcement.
#[must_use]
pub fn is_owned_by_script(text: &str, emoji: &str, config: &RuntimeConfig) -> bool {
    let emoji = normalize(emoji);
    let text = normalize(text);

    let sentinel = emoji == normalize(&config.status_emoji)
        || emoji == normalize(&config.status_emoji_unicode);

    sentinel && (text.is_empty() || text.contains(TRACK_SEPARATOR))
}

/// True iff the remote status is only partially set.
///
/// A status missing either its text or its emoji is considered safe to
/// replace while music is playing, regardless of who set it. Fully
/// populated foreign statuses are what the override gate protects.
#[must_use]
pub fn is_safe_to_override_when_playing(text: &str, emoji: &str) -> bool {
    normalize(text).is_empty() || normalize(emoji).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RuntimeConfig {
        RuntimeConfig {
            status_emoji: ":headphones:".to_string(),
            status_emoji_unicode: "🎧".to_string(),
            ..RuntimeConfig::default()
        }
    }

    #[test]
    fn test_normalize_trims_whitespace() {
        assert_eq!(normalize("  hello  "), "hello");
        assert_eq!(normalize("\t:pizza:\n"), ":pizza:");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_is_empty_requires_both_fields_empty() {
        assert!(is_empty("", ""));
        assert!(is_empty("   ", "\t"));
        assert!(!is_empty("Lunch", ""));
        assert!(!is_empty("", ":pizza:"));
        assert!(!is_empty("Lunch", ":pizza:"));
    }

    #[test]
    fn test_owned_with_sentinel_emoji_and_empty_text() {
        let config = test_config();
        assert!(is_owned_by_script("", ":headphones:", &config));
        assert!(is_owned_by_script("   ", ":headphones:", &config));
    }

    #[test]
    fn test_owned_with_sentinel_emoji_and_separator_text() {
        let config = test_config();
        assert!(is_owned_by_script("Miles Davis - So What", ":headphones:", &config));
        assert!(is_owned_by_script("Miles Davis - So What", "🎧", &config));
    }

    #[test]
    fn test_not_owned_without_separator() {
        let config = test_config();
        // Sentinel emoji but text without the separator: someone else's status
        assert!(!is_owned_by_script("listening to jazz", ":headphones:", &config));
    }

    #[test]
    fn test_not_owned_with_foreign_emoji_regardless_of_text() {
        let config = test_config();
        assert!(!is_owned_by_script("", ":pizza:", &config));
        assert!(!is_owned_by_script("Miles Davis - So What", ":pizza:", &config));
        assert!(!is_owned_by_script("Lunch", "", &config));
    }

    #[test]
    fn test_unicode_glyph_counts_as_sentinel() {
        let config = test_config();
        assert!(is_owned_by_script("", "🎧", &config));
        assert!(is_owned_by_script(" Artist - Title ", " 🎧 ", &config));
    }

    #[test]
    fn test_safe_to_override_when_partially_set() {
        assert!(is_safe_to_override_when_playing("", ""));
        assert!(is_safe_to_override_when_playing("Lunch", ""));
        assert!(is_safe_to_override_when_playing("", ":pizza:"));
        assert!(!is_safe_to_override_when_playing("Lunch", ":pizza:"));
    }

    #[test]
    fn test_safe_to_override_ignores_ownership() {
        // A partially-set foreign status is still safe; safety and
        // ownership are independent axes.
        let config = test_config();
        assert!(!is_owned_by_script("Lunch", "", &config));
        assert!(is_safe_to_override_when_playing("Lunch", ""));
    }

    #[test]
    fn test_empty_implies_safe() {
        // Property from the reconciler's point of view: every empty
        // status is also safe to override.
        for (text, emoji) in [("", ""), ("  ", ""), ("", "  ")] {
            assert!(is_empty(text, emoji));
            assert!(is_safe_to_override_when_playing(text, emoji));
        }
    }
}
