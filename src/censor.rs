//! Track-label filtering before publication.
//!
//! Track titles come from other people's tag metadata, and a status is
//! visible to an entire workspace. The [`TextFilter`] seam lets the
//! reconciler scrub the label without caring how; the default
//! [`WordlistFilter`] masks configured words with asterisks.

/// The text-filter capability applied to every published track label.
pub trait TextFilter {
    fn filter(&self, input: &str) -> String;
}

/// Masks every occurrence of the configured words, case-insensitively,
/// preserving the length of what it hides.
pub struct WordlistFilter {
    words: Vec<String>,
}

impl WordlistFilter {
    pub fn new(words: &[String]) -> Self {
        Self {
            words: words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }
}

impl TextFilter for WordlistFilter {
    fn filter(&self, input: &str) -> String {
        let mut output = input.to_string();

        for word in &self.words {
            let mut result = String::with_capacity(output.len());
            let mut rest = output.as_str();

            loop {
                let lower = rest.to_lowercase();
                match lower.find(word.as_str()) {
                    Some(idx) => {
                        // Find the byte range in the original casing. The
                        // lowercase copy can shift byte offsets for some
                        // Unicode, so fall back to passing the rest through
                        // when the offset no longer lands on a boundary.
                        if !rest.is_char_boundary(idx) {
                            result.push_str(rest);
                            break;
                        }
                        let end = idx + word.len();
                        if end > rest.len() || !rest.is_char_boundary(end) {
                            result.push_str(rest);
                            break;
                        }
                        result.push_str(&rest[..idx]);
                        result.push_str(&"*".repeat(word.chars().count()));
                        rest = &rest[end..];
                    }
                    None => {
                        result.push_str(rest);
                        break;
                    }
                }
            }

            output = result;
        }

        output
    }
}
