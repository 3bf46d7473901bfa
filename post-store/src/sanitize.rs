/// Characters that are illegal in file names on at least one common platform.
pub const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

pub const DEFAULT_MAX_TITLE_LENGTH: usize = 50;

const ELLIPSIS: &str = "...";

/// Turns post titles into file-system safe identifiers.
///
/// Forbidden characters are dropped, surrounding whitespace trimmed, and
/// anything longer than `max_len` characters is cut to `max_len - 3`
/// characters followed by `...`. Distinct titles may collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sanitizer {
    max_len: usize,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TITLE_LENGTH)
    }
}

impl Sanitizer {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len: max_len.max(ELLIPSIS.len() + 1),
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn sanitize(&self, title: &str) -> String {
        let cleaned: String = title.chars().filter(|c| !FORBIDDEN_CHARS.contains(c)).collect();
        let trimmed = cleaned.trim();

        if trimmed.chars().count() <= self.max_len {
            return trimmed.to_string();
        }

        let mut truncated: String = trimmed.chars().take(self.max_len - ELLIPSIS.len()).collect();
        truncated.push_str(ELLIPSIS);
        truncated
    }
}

pub fn sanitize_title(title: &str) -> String {
    Sanitizer::default().sanitize(title)
}
