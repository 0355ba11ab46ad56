//! Fuzzy matching of a guessed title against metadata search results.

use crate::core::guesser::alphanum;
use crate::models::movie::MovieInfo;
use std::collections::HashMap;

/// Default similarity under which a match is unsure.
pub const DEFAULT_UNSURE_THRESHOLD: f64 = 0.7;

/// Best candidate for a guessed title.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult<'a> {
    /// Best scoring candidate, if any scored above zero.
    pub best: Option<&'a MovieInfo>,
    /// Similarity of the best candidate, in `[0, 1]`.
    pub ratio: f64,
    /// Whether the ratio is under the confidence threshold.
    pub unsure: bool,
}

/// Picks the candidate whose title variants are closest to a guessed title.
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    threshold: f64,
}

impl FuzzyMatcher {
    /// Create a matcher flagging matches under `threshold` as unsure.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Find the best candidate.
    ///
    /// With a year, only candidates from that year are scored; an unsure
    /// year-restricted result is always replaced by a match over every
    /// candidate, even if that one is unsure too.
    pub fn best_match<'a>(
        &self,
        guessed_title: &str,
        guessed_year: Option<u16>,
        candidates: &'a [MovieInfo],
    ) -> MatchResult<'a> {
        let guessed = normalize(guessed_title);

        let mut best: Option<&'a MovieInfo> = None;
        let mut best_ratio = 0.0;

        let pool = candidates
            .iter()
            .filter(|c| guessed_year.is_none() || c.year == guessed_year);

        for candidate in pool {
            for variant in candidate.title_variants() {
                // AKA entries may carry a "::country" suffix
                let variant = variant.split("::").next().unwrap_or(variant);
                let ratio = similarity(&normalize(variant), &guessed);
                if ratio > best_ratio {
                    tracing::debug!(
                        "ratio {:.3} for [{}] against [{}]",
                        ratio,
                        variant,
                        guessed
                    );
                    best_ratio = ratio;
                    best = Some(candidate);
                }
            }
        }

        let unsure = best_ratio < self.threshold;
        if unsure && guessed_year.is_some() {
            tracing::debug!("Unsure match restricted to year, retrying on all results");
            return self.best_match(guessed_title, None, candidates);
        }

        MatchResult {
            best,
            ratio: best_ratio,
            unsure,
        }
    }
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_UNSURE_THRESHOLD)
    }
}

/// Normalize a title for comparison.
fn normalize(title: &str) -> String {
    alphanum(title, " ").to_lowercase()
}

/// Longest-matching-block similarity of two strings, in `[0, 1]`.
///
/// Twice the number of characters in the recursively found longest common
/// blocks, divided by the total length of both strings.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

/// Total size of the matching blocks between `a` and `b`.
fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, c) in b.iter().enumerate() {
        b2j.entry(*c).or_default().push(j);
    }

    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }
    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`.
///
/// Ties go to the block starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b2j: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    let mut j2len: HashMap<usize, usize> = HashMap::new();

    for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut new_j2len = HashMap::new();
        if let Some(positions) = b2j.get(c) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j
                    .checked_sub(1)
                    .and_then(|prev| j2len.get(&prev))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                new_j2len.insert(j, k);
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        j2len = new_j2len;
    }

    (best_i, best_j, best_size)
}
