//! Slug normalization.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::constants::MAX_SLUG_LENGTH;

static NON_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("Invalid regex pattern"));

static HTML_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid regex pattern"));

/// Turns free text into a URL-safe slug.
pub trait SlugPolicy: Send + Sync {
    /// Returns the normalized slug, or an empty string when nothing usable remains.
    fn slugify(&self, text: &str) -> String;
}

/// Lower-case, dash-separated ASCII slugs truncated to `max_length`.
#[derive(Debug, Clone)]
pub struct DefaultSlugPolicy {
    max_length: usize,
}

impl DefaultSlugPolicy {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length: max_length.max(1),
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for DefaultSlugPolicy {
    fn default() -> Self {
        Self::new(MAX_SLUG_LENGTH)
    }
}

impl SlugPolicy for DefaultSlugPolicy {
    fn slugify(&self, text: &str) -> String {
        let folded: String = text.chars().map(fold_accent).collect::<String>().to_lowercase();
        let dashed = NON_SLUG_CHARS.replace_all(&folded, "-");
        truncate_slug(dashed.trim_matches('-'), self.max_length)
    }
}

/// Maps common Latin accented letters to their ASCII base.
fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'ç' => 'c',
        'Ç' => 'C',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'È' | 'É' | 'Ê' | 'Ë' => 'E',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => 'O',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
        'ý' | 'ÿ' => 'y',
        'Ý' => 'Y',
        _ => c,
    }
}

/// True when `slug` only uses `[a-z0-9-]` and is non-empty.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Longest `-<n>` suffix [`next_available_slug`] can append.
pub const MAX_SLUG_SUFFIX_LENGTH: usize = 21;

/// First `max_chars` characters of `slug`, without a trailing dash.
pub fn truncate_slug(slug: &str, max_chars: usize) -> String {
    let mut stem: String = slug.chars().take(max_chars).collect();
    while stem.ends_with('-') {
        stem.pop();
    }
    stem
}

/// Shortest stem a suffixed variant of `base` can keep. Every candidate
/// [`next_available_slug`] may produce starts with it.
pub fn slug_candidate_prefix(base: &str, max_length: usize) -> String {
    truncate_slug(base, max_length.saturating_sub(MAX_SLUG_SUFFIX_LENGTH))
}

/// Picks `base`, or `base-1`, `base-2`, ... when taken. The stem is cut so
/// every candidate fits in `max_length` characters.
///
/// `taken` holds the existing slugs starting with [`slug_candidate_prefix`], lower-cased.
pub fn next_available_slug(base: &str, taken: &HashSet<String>, max_length: usize) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (1u64..)
        .map(|n| {
            let suffix = n.to_string();
            let stem = truncate_slug(base, max_length.saturating_sub(suffix.len() + 1));
            if stem.is_empty() {
                suffix
            } else {
                format!("{}-{}", stem, suffix)
            }
        })
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Removes HTML-like tags from user supplied text.
pub fn strip_tags(text: &str) -> String {
    HTML_TAGS.replace_all(text, "").into_owned()
}
