use chrono::Local;
use rand::{seq::SliceRandom, thread_rng};

pub const DEFAULT_FILE_NAME_PREFIX: &str = "stylecast";
pub const DEFAULT_RANDOM_SUFFIX_LENGTH: usize = 5;
pub const PROMPT_STEM_MAX_LEN: usize = 50;
const SEPARATOR: char = '_';
const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Turn a free-form label into a storage key.
///
/// ASCII letters and digits are lowercased and kept, runs of ASCII whitespace
/// or punctuation collapse into a single `_`, and non-ASCII characters are
/// dropped. Returns `None` when nothing usable remains.
pub fn slugify(input: &str) -> Option<String> {
    let mut slug = String::with_capacity(input.len());
    let mut last_was_separator = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_separator = false;
        } else if (ch.is_ascii_whitespace() || ch.is_ascii_punctuation())
            && !last_was_separator
            && !slug.is_empty()
        {
            slug.push(SEPARATOR);
            last_was_separator = true;
        }
    }

    let slug = slug.trim_matches(SEPARATOR).to_string();
    if slug.is_empty() { None } else { Some(slug) }
}

pub fn truncate_slug(slug: &str, max_len: usize) -> String {
    if slug.len() <= max_len {
        return slug.to_string();
    }

    let truncated: String = slug.chars().take(max_len).collect();
    let trimmed = truncated.trim_end_matches(SEPARATOR).to_string();
    if trimmed.is_empty() {
        truncated
    } else {
        trimmed
    }
}

/// Filesystem-safe stem derived from an image prompt.
pub fn prompt_stem(prompt: &str) -> Option<String> {
    slugify(prompt).map(|slug| truncate_slug(&slug, PROMPT_STEM_MAX_LEN))
}

#[derive(Debug, Clone)]
pub struct ImageNameContext {
    base: String,
}

impl ImageNameContext {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    /// Names generated images after the prompt that produced them.
    pub fn from_prompt(prompt: &str) -> Self {
        let base = prompt_stem(prompt).unwrap_or_else(|| DEFAULT_FILE_NAME_PREFIX.to_string());
        Self::new(base)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn file_stem(&self, index: usize) -> String {
        let suffix = unique_suffix(DEFAULT_RANDOM_SUFFIX_LENGTH);
        format!("{}-p{}-{}", self.base, index, suffix)
    }
}

/// Random characters drawn without repetition from `A-Z0-9`.
pub fn unique_suffix(length: usize) -> String {
    debug_assert!(length <= SUFFIX_ALPHABET.len());
    let mut rng = thread_rng();
    SUFFIX_ALPHABET
        .choose_multiple(&mut rng, length)
        .copied()
        .map(char::from)
        .collect()
}

/// Local time formatted as `YYYYMMDD_HHMMSS`.
pub fn timestamp_label() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

pub fn trimmed_or_none(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}
