//! Search suggestions from a fixed vocabulary,
//! and search queries derived from image file names.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

pub const CATEGORIES: [&str; 12] = [
    "electronics",
    "clothing",
    "home",
    "kitchen",
    "sports",
    "books",
    "toys",
    "beauty",
    "automotive",
    "garden",
    "furniture",
    "jewelry",
];

pub const PRICE_RANGES: [&str; 5] = [
    "under $25",
    "under $50",
    "under $100",
    "under $200",
    "under $500",
];

/// Suggestions are only offered for input of at least this many characters.
pub const MIN_INPUT_CHARS: usize = 2;
pub const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    #[display("Category")]
    Category,
    #[display("Price Range")]
    PriceRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub text: &'static str,
    pub kind: SuggestionKind,
}

/// Suggestions matching `input` case insensitively, categories first.
pub fn suggestions(input: &str) -> Vec<Suggestion> {
    if input.chars().count() < MIN_INPUT_CHARS {
        return Vec::new();
    }
    let needle = input.to_lowercase();

    let categories = CATEGORIES.iter().map(|text| Suggestion {
        text,
        kind: SuggestionKind::Category,
    });
    let price_ranges = PRICE_RANGES.iter().map(|text| Suggestion {
        text,
        kind: SuggestionKind::PriceRange,
    });

    categories
        .chain(price_ranges)
        .filter(|suggestion| suggestion.text.contains(needle.as_str()))
        .take(MAX_SUGGESTIONS)
        .collect()
}

static FILE_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.[^/.]+$").expect("extension regex is valid"));
static TERM_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_\s]+").expect("separator regex is valid"));

/// The words of an image file name as a search query,
/// e.g. `Red_running-shoes.JPG` searches for `red running shoes`.
pub fn query_from_image_name(file_name: &str) -> String {
    let file_name = file_name.to_lowercase();
    let stem = FILE_EXTENSION.replace(&file_name, "");
    TERM_SEPARATORS
        .split(&stem)
        .filter(|term| !term.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
