//! Filter expressions and ordering over cached movie records.
//!
//! A filter is a sequence of `@keyword:value[,value...]` clauses, all of
//! which must hold. Keywords are `genre`, `director`, `actor`, `country`,
//! `size` (`+N` keeps files over N MB, `-N` under) and `unsure` (no value).

use crate::core::cache::CacheStore;
use crate::models::cache::MovieRecord;
use crate::{Error, Result};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Metadata list a keyword clause looks into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListField {
    Genres,
    Directors,
    Cast,
    Countries,
}

impl ListField {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "genre" => Some(Self::Genres),
            "director" => Some(Self::Directors),
            "actor" => Some(Self::Cast),
            "country" => Some(Self::Countries),
            _ => None,
        }
    }

    fn values(self, record: &MovieRecord) -> &[String] {
        match self {
            Self::Genres => &record.metadata.genres,
            Self::Directors => &record.metadata.directors,
            Self::Cast => &record.metadata.cast,
            Self::Countries => &record.metadata.countries,
        }
    }
}

/// One parsed filter clause.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterClause {
    /// Keep records whose list field shares a value with the set (lowercase).
    AnyOf {
        field: ListField,
        values: BTreeSet<String>,
    },
    /// Keep records where `sign * threshold_mb < sign * size_mb`.
    Size { sign: f64, threshold_mb: f64 },
    /// Keep records flagged unsure.
    Unsure,
}

impl FilterClause {
    /// Whether a record passes this clause.
    pub fn matches(&self, record: &MovieRecord) -> bool {
        match self {
            FilterClause::AnyOf { field, values } => field
                .values(record)
                .iter()
                .any(|v| values.contains(&v.to_lowercase())),
            FilterClause::Size { sign, threshold_mb } => record
                .size_mb()
                .map(|size| sign * threshold_mb < sign * size)
                .unwrap_or(false),
            FilterClause::Unsure => record.guess.unsure,
        }
    }
}

/// Parse a whole filter expression.
///
/// Any malformed clause rejects the whole expression.
pub fn parse_filter(expression: &str) -> Result<Vec<FilterClause>> {
    let mut clauses = Vec::new();
    let mut rest = expression.trim();

    while !rest.is_empty() {
        let body = rest
            .strip_prefix('@')
            .ok_or_else(|| Error::FilterParse(format!("clause must start with '@': {}", rest)))?;

        // value-less clause
        if let Some(after) = body.strip_prefix("unsure") {
            if after.is_empty() || after.starts_with('@') {
                clauses.push(FilterClause::Unsure);
                rest = after;
                continue;
            }
        }

        let colon = body
            .find(':')
            .ok_or_else(|| Error::FilterParse(format!("missing ':' in {}", rest)))?;
        let keyword = &body[..colon];
        let after = &body[colon + 1..];
        let (raw_values, next) = match after.find('@') {
            Some(at) => (&after[..at], &after[at..]),
            None => (after, ""),
        };
        let values: BTreeSet<String> = raw_values.split(',').map(|v| v.to_lowercase()).collect();

        let clause = match keyword {
            "unsure" => FilterClause::Unsure,
            "size" => parse_size(&values)?,
            other => match ListField::from_keyword(other) {
                Some(field) => FilterClause::AnyOf { field, values },
                None => return Err(Error::FilterParse(format!("unknown keyword '{}'", other))),
            },
        };
        clauses.push(clause);
        rest = next;
    }

    Ok(clauses)
}

fn parse_size(values: &BTreeSet<String>) -> Result<FilterClause> {
    if values.len() != 1 {
        return Err(Error::FilterParse("size takes exactly one value".to_string()));
    }
    let raw = values.iter().next().map(String::as_str).unwrap_or_default();

    let (sign, number) = match raw.strip_prefix('-') {
        Some(number) => (-1.0, number),
        None => (1.0, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let threshold_mb: f64 = number
        .trim()
        .parse()
        .map_err(|_| Error::FilterParse(format!("size is not a number: {}", raw)))?;

    Ok(FilterClause::Size { sign, threshold_mb })
}

/// Keep the files passing every clause of `expression`.
///
/// An invalid expression is logged and keeps nothing.
pub fn apply_filter(files: Vec<PathBuf>, expression: &str, cache: &CacheStore) -> Vec<PathBuf> {
    tracing::info!("Number of files before filtering: {}", files.len());

    let clauses = match parse_filter(expression) {
        Ok(clauses) => clauses,
        Err(e) => {
            tracing::error!("{}", e);
            return Vec::new();
        }
    };

    let default_record = MovieRecord::default();
    let kept: Vec<PathBuf> = files
        .into_iter()
        .filter(|path| {
            let record = cache.record_for_path(path).unwrap_or(&default_record);
            clauses.iter().all(|clause| clause.matches(record))
        })
        .collect();

    tracing::info!("Number of files after filtering: {}", kept.len());
    kept
}

/// Sort key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    /// Best rated first.
    #[default]
    Rating,
    /// Canonical title, A to Z.
    Alphabetical,
}

/// Stable sort of files by their record, optionally reversed.
///
/// Missing values sort before any present value.
pub fn sort_files(files: &mut [PathBuf], cache: &CacheStore, mode: SortMode, reverse: bool) {
    let descending = match mode {
        SortMode::Rating => !reverse,
        SortMode::Alphabetical => reverse,
    };

    files.sort_by(|a, b| {
        let ra = cache.record_for_path(a);
        let rb = cache.record_for_path(b);
        let ordering = match mode {
            SortMode::Rating => compare_ratings(
                ra.and_then(|r| r.metadata.rating),
                rb.and_then(|r| r.metadata.rating),
            ),
            SortMode::Alphabetical => {
                let ta = ra.and_then(|r| r.metadata.canonical_title.as_deref());
                let tb = rb.and_then(|r| r.metadata.canonical_title.as_deref());
                ta.cmp(&tb)
            }
        };
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

fn compare_ratings(a: Option<f32>, b: Option<f32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}
