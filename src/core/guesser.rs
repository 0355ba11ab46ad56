//! Title and year guessing from a media filename.
//!
//! Release names usually look like `Title.Year.Tags-GROUP.ext` or
//! `Title (Year) [Tags].ext`; the guesser keeps what comes before the
//! bracketed part, the year and any all-caps tag run, then normalizes it
//! for a free-text metadata search.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

/// Leading text before any bracket or parenthesis.
static BEFORE_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\[(]+").unwrap());

/// Everything before the last year-looking number.
static BEFORE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*)[12][089][0-9]{2}").unwrap());

/// A year-looking number anywhere.
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[12][089][0-9]{2}").unwrap());

/// Runs of characters that are not ASCII alphanumerics.
static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9]+").unwrap());

/// Rip, source and codec tags that never belong to a title.
const STOP_WORDS: &[&str] = &[
    "divx", "dvdrip", "xvid", "ts", "dvdscr", "cam", "aac", "r5", "brrip", "bdrip", "bluray",
    "webrip", "hdrip", "x264", "x265", "h264", "hevc", "ac3", "dts", "720p", "1080p", "2160p",
];

/// Titles shorter than this after cutting fall back to the uncut text.
const MIN_TITLE_LEN: usize = 3;

/// Oldest and newest plausible release years.
const YEAR_RANGE: std::ops::RangeInclusive<u16> = 1800..=2100;

/// Result of guessing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuessedTitle {
    /// Normalized lowercase title.
    pub title: String,
    /// Release year, if one was found.
    pub year: Option<u16>,
}

/// Guess a title and year from a filename or path.
pub fn guess(filename: &str) -> GuessedTitle {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let before_bracket = BEFORE_BRACKET
        .find(&stem)
        .map(|m| m.as_str())
        .unwrap_or(&stem);
    let base = alphanum(before_bracket, " ");

    let title = cut_before_year(&base);
    let title = cut_before_uppercase_run(&title);
    let title = if title.chars().count() < MIN_TITLE_LEN {
        base.clone()
    } else {
        title
    };

    let title = alphanum(&title, " ").to_lowercase();
    let title = title
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ");

    GuessedTitle {
        title,
        year: guess_year(&stem),
    }
}

/// First plausible year in a string.
pub fn guess_year(text: &str) -> Option<u16> {
    YEAR.find(text)
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .filter(|year| YEAR_RANGE.contains(year))
}

/// Fold to ASCII and replace every non-alphanumeric run by `fill`.
pub fn alphanum(text: &str, fill: &str) -> String {
    let ascii: String = text.nfkd().filter(|c| c.is_ascii()).collect();
    let trimmed = ascii.trim_matches(|c: char| !c.is_ascii_alphanumeric());
    NON_ALNUM.replace_all(trimmed, fill).to_string()
}

/// Keep the text before the last year; unchanged if that leaves nothing.
fn cut_before_year(text: &str) -> String {
    match BEFORE_YEAR.captures(text).and_then(|c| c.get(1)) {
        Some(m) if !m.as_str().is_empty() => m.as_str().to_string(),
        _ => text.to_string(),
    }
}

/// Keep the text before the first run of two uppercase letters.
///
/// At least one character is kept, so a title starting in capitals is
/// cut to a single letter and then caught by the length fallback.
fn cut_before_uppercase_run(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    for i in 1..chars.len().saturating_sub(1) {
        if chars[i].is_ascii_uppercase() && chars[i + 1].is_ascii_uppercase() {
            return chars[..i].iter().collect();
        }
    }
    text.to_string()
}
