use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// English and Spanish filler words never reported as keywords.
pub const STOP_WORDS: &[&str] = &[
    "the", "be", "to", "of", "and", "a", "in", "that", "have", "i", "it", "for", "not", "on",
    "with", "he", "as", "you", "do", "at", "this", "but", "his", "by", "from", "el", "la", "los",
    "las", "de", "en", "y", "que", "del", "se", "un", "una", "unos", "unas",
];

/// Tokens this short or shorter are ignored.
const MIN_TOKEN_CHARS: usize = 3;

static WORD_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
/// Decimal digits only. Roman numerals and other numeric letters are words.
static DIGITS_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordCount {
    pub word: String,
    pub count: usize,
}

/// The `n` most frequent meaningful words across `titles`.
///
/// Titles are lowercased and split into Unicode word runs. Words of three
/// characters or fewer, words made only of decimal digits and stop words
/// are dropped.
/// Equal counts keep the order in which the words first appeared.
pub fn top_keywords<S: AsRef<str>>(titles: &[S], n: usize) -> Vec<KeywordCount> {
    let (Some(pattern), Some(digits)) = (
        WORD_PATTERN.get_or_init(|| Regex::new(r"\w+").ok()),
        DIGITS_PATTERN.get_or_init(|| Regex::new(r"^\d+$").ok()),
    ) else {
        tracing::error!("Keyword pattern failed to compile");
        return Vec::new();
    };

    let text = titles
        .iter()
        .map(|t| t.as_ref())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let mut order: Vec<KeywordCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for word in pattern.find_iter(&text).map(|m| m.as_str()) {
        if !is_meaningful(word, digits) {
            continue;
        }
        match index.get(word) {
            Some(&pos) => order[pos].count += 1,
            None => {
                index.insert(word, order.len());
                order.push(KeywordCount {
                    word: word.to_string(),
                    count: 1,
                });
            }
        }
    }

    // stable: ties stay in first-seen order
    order.sort_by(|a, b| b.count.cmp(&a.count));
    order.truncate(n);
    order
}

fn is_meaningful(word: &str, digits: &Regex) -> bool {
    word.chars().count() > MIN_TOKEN_CHARS
        && !digits.is_match(word)
        && !STOP_WORDS.contains(&word)
}
