//! Command line argument definitions.

use crate::core::filter::SortMode;
use clap::{ArgGroup, Parser};

/// lm - list your movies with their metadata
#[derive(Parser, Debug, Default)]
#[command(name = "lm")]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("action")
        .args(["delete_cache", "confirm", "upload"])
        .multiple(false)
))]
pub struct Cli {
    /// Files or directories to list; `cache` lists every cached file
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// Sort by title instead of rating
    #[arg(short, long)]
    pub alphabetical: bool,

    /// Reverse the sort order
    #[arg(short, long)]
    pub reverse: bool,

    /// Remove the selected files from the cache
    #[arg(short, long)]
    pub delete_cache: bool,

    /// Filter, e.g. "@genre:action,drama@size:+500@unsure"
    #[arg(short, long, value_name = "FILTER")]
    pub filter: Option<String>,

    /// Show more information per movie
    #[arg(short, long)]
    pub long: bool,

    /// Show even more information per movie (cast and summary)
    #[arg(short = 'L', long)]
    pub very_long: bool,

    /// Show the plot outline
    #[arg(short, long)]
    pub outline: bool,

    /// Confirm or correct the stored movie for each file
    #[arg(long, requires = "files")]
    pub confirm: bool,

    /// Send fingerprints of manually identified movies to OpenSubtitles
    #[arg(long)]
    pub upload: bool,

    /// Download subtitles in this language (e.g. eng, fre)
    #[arg(long, value_name = "LANG")]
    pub download: Option<String>,

    /// Write an HTML summary of the listed movies
    #[arg(short = 'S', long)]
    pub show: bool,

    /// Delete every cache file
    #[arg(long)]
    pub reset: bool,

    /// Debug output, also logged to a file in the cache directory
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Sort mode selected by the flags.
    pub fn sort_mode(&self) -> SortMode {
        if self.alphabetical {
            SortMode::Alphabetical
        } else {
            SortMode::Rating
        }
    }

    /// Listing density; confirming and uploading need the long listing.
    pub fn detail(&self) -> Detail {
        if self.very_long {
            Detail::VeryLong
        } else if self.long || self.confirm || self.upload {
            Detail::Long
        } else {
            Detail::Short
        }
    }
}

/// How much to print per movie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Detail {
    Short,
    Long,
    VeryLong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_parse() {
        let cli = Cli::try_parse_from(["lm", "-a", "-r", "-f", "@unsure", "/movies"]).unwrap();
        assert_eq!(cli.sort_mode(), SortMode::Alphabetical);
        assert!(cli.reverse);
        assert_eq!(cli.filter.as_deref(), Some("@unsure"));
        assert_eq!(cli.files, vec!["/movies".to_string()]);
        assert_eq!(cli.detail(), Detail::Short);
    }

    #[test]
    fn test_actions_are_exclusive() {
        assert!(Cli::try_parse_from(["lm", "-d", "--upload", "x"]).is_err());
        assert!(Cli::try_parse_from(["lm", "--confirm", "--upload", "x"]).is_err());
    }

    #[test]
    fn test_confirm_needs_files_and_implies_long() {
        assert!(Cli::try_parse_from(["lm", "--confirm"]).is_err());
        let cli = Cli::try_parse_from(["lm", "--confirm", "x.mkv"]).unwrap();
        assert_eq!(cli.detail(), Detail::Long);
    }
}
