//! Script-aware word extraction and cache-key normalization.
//!
//! # Segmentation
//!
//! Words are maximal runs of word-forming characters. Besides the generic
//! Unicode word class, the word class explicitly includes whole Unicode
//! blocks for scripts whose words contain combining marks (vowel signs,
//! nukta, virama): Arabic and its supplements and presentation forms, the
//! Indic scripts, Sinhala, Thai, Lao and Myanmar. Internal hyphens and
//! apostrophes join runs (`well-known`, `don't`).
//!
//! Han, Hiragana, Katakana and Hangul have no whitespace word boundaries, so
//! each such codepoint is emitted as a one-character word. Any non-CJK text
//! around them is segmented with the general pattern, keeping source order.
//!
//! # Normalization
//!
//! [`normalize_word`] produces the cache key:
//!
//! 1. Unicode NFC
//! 2. strip Arabic tashkil (U+064B..=U+0652)
//! 3. lowercase
//! 4. trim whitespace and edge punctuation/quotes (internal characters kept)
//!
//! The pipeline is idempotent.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::models::LookupCache;
use crate::stopwords;

const WORD_CLASS: &str = concat!(
    r"\w",
    r"\x{0300}-\x{036F}", // combining diacritical marks
    r"\x{0600}-\x{06FF}", // Arabic
    r"\x{0750}-\x{077F}", // Arabic Supplement
    r"\x{08A0}-\x{08FF}", // Arabic Extended-A
    r"\x{0900}-\x{097F}", // Devanagari
    r"\x{0980}-\x{09FF}", // Bengali
    r"\x{0A00}-\x{0A7F}", // Gurmukhi
    r"\x{0A80}-\x{0AFF}", // Gujarati
    r"\x{0B00}-\x{0B7F}", // Oriya
    r"\x{0B80}-\x{0BFF}", // Tamil
    r"\x{0C00}-\x{0C7F}", // Telugu
    r"\x{0C80}-\x{0CFF}", // Kannada
    r"\x{0D00}-\x{0D7F}", // Malayalam
    r"\x{0D80}-\x{0DFF}", // Sinhala
    r"\x{0E00}-\x{0E7F}", // Thai
    r"\x{0E80}-\x{0EFF}", // Lao
    r"\x{1000}-\x{109F}", // Myanmar
    r"\x{FB50}-\x{FDFF}", // Arabic Presentation Forms-A
    r"\x{FE70}-\x{FEFF}", // Arabic Presentation Forms-B
);

static WORD_RE: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!("[{c}]+(?:[-'’][{c}]+)*", c = WORD_CLASS);
    Regex::new(&pattern).expect("word pattern is valid")
});

/// Characters trimmed from both ends of a word during normalization.
const EDGE_PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', '"', '\'', '`', '(', ')', '[', ']', '{', '}', '<', '>', '-',
    '_', '/', '\\', '*', '«', '»', '“', '”', '„', '‟', '‘', '’', '‚', '‹', '›', '¿', '¡', '…',
    '–', '—', '،', '؛', '؟', '۔', '。', '，', '、', '！', '？', '：', '；', '「', '」', '『',
    '』', '（', '）', '।', '॥',
];

/// Returns true for Han, Hiragana, Katakana and Hangul codepoints.
pub fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x309F         // Hiragana
        | 0x30A0..=0x30FA       // Katakana (without the middle dot)
        | 0x30FC..=0x30FF
        | 0x31F0..=0x31FF       // Katakana phonetic extensions
        | 0x3400..=0x4DBF       // CJK Extension A
        | 0x4E00..=0x9FFF       // CJK Unified Ideographs
        | 0xF900..=0xFAFF       // CJK Compatibility Ideographs
        | 0x1100..=0x11FF       // Hangul Jamo
        | 0x3130..=0x318F       // Hangul Compatibility Jamo
        | 0xAC00..=0xD7AF       // Hangul Syllables
        | 0x20000..=0x2A6DF     // CJK Extension B
    )
}

/// Extract raw words from `text` in source order.
///
/// Words are neither deduplicated nor normalized.
///
/// ```rust
/// use lookup_cache_core::tokenize::extract_words;
///
/// assert_eq!(extract_words("我爱你"), vec!["我", "爱", "你"]);
/// assert_eq!(extract_words("I love 你好"), vec!["I", "love", "你", "好"]);
/// ```
pub fn extract_words(text: &str) -> Vec<String> {
    if !text.chars().any(is_cjk) {
        return general_words(text);
    }

    let mut words = Vec::new();
    let mut run_start = 0;
    for (idx, c) in text.char_indices() {
        if is_cjk(c) {
            words.extend(general_words(&text[run_start..idx]));
            words.push(c.to_string());
            run_start = idx + c.len_utf8();
        }
    }
    words.extend(general_words(&text[run_start..]));
    words
}

fn general_words(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn is_arabic_diacritic(c: char) -> bool {
    ('\u{064B}'..='\u{0652}').contains(&c)
}

/// Normalize a surface word into its cache key.
///
/// ```rust
/// use lookup_cache_core::tokenize::normalize_word;
///
/// assert_eq!(normalize_word("Café."), "café");
/// assert_eq!(normalize_word("كَتَبَ"), normalize_word("كتب"));
/// ```
pub fn normalize_word(word: &str) -> String {
    let composed: String = word.nfc().filter(|c| !is_arabic_diacritic(*c)).collect();
    composed
        .to_lowercase()
        .trim_matches(|c: char| c.is_whitespace() || EDGE_PUNCTUATION.contains(&c))
        .to_string()
}

/// Returns true when `word` (already normalized) is a stopword.
///
/// `language` may be a full name (`"English"`) or a short code (`"en"`),
/// in any case. Independently of language, any ASCII-only word of at most
/// two characters counts as a stopword.
pub fn is_stopword(word: &str, language: &str) -> bool {
    if word.chars().count() <= 2 && word.is_ascii() {
        return true;
    }
    stopwords::for_language(language)
        .map(|set| set.contains(word))
        .unwrap_or(false)
}

/// Walk `sentences` and return the unique normalized words that still need
/// a lookup, in first-seen order.
///
/// Skips words shorter than `min_word_length` characters, words seen earlier
/// in this call, words already cached in `existing`, and (when
/// `skip_stopwords` is set) stopwords.
pub fn extract_unique_words<S: AsRef<str>>(
    sentences: &[S],
    existing: Option<&LookupCache>,
    language: &str,
    skip_stopwords: bool,
    min_word_length: usize,
) -> Vec<String> {
    let mut unique = Vec::new();
    walk_candidates(sentences, min_word_length, |word| {
        if existing.map(|c| c.contains(word)).unwrap_or(false) {
            return;
        }
        if skip_stopwords && is_stopword(word, language) {
            return;
        }
        unique.push(word.to_string());
    });
    unique
}

/// Count the stopwords [`extract_unique_words`] would skip, excluding words
/// that are already cached.
pub fn count_skipped_stopwords<S: AsRef<str>>(
    sentences: &[S],
    existing: Option<&LookupCache>,
    language: &str,
    min_word_length: usize,
) -> usize {
    let mut skipped = 0;
    walk_candidates(sentences, min_word_length, |word| {
        if existing.map(|c| c.contains(word)).unwrap_or(false) {
            return;
        }
        if is_stopword(word, language) {
            skipped += 1;
        }
    });
    skipped
}

/// Shared dedup walk: calls `visit` once per distinct normalized word that
/// meets the minimum length.
fn walk_candidates<S, F>(sentences: &[S], min_word_length: usize, mut visit: F)
where
    S: AsRef<str>,
    F: FnMut(&str),
{
    let mut seen: HashSet<String> = HashSet::new();
    for sentence in sentences {
        for raw in extract_words(sentence.as_ref()) {
            let word = normalize_word(&raw);
            if word.is_empty() || word.chars().count() < min_word_length {
                continue;
            }
            if !seen.insert(word.clone()) {
                continue;
            }
            visit(&word);
        }
    }
}
