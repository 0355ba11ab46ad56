//! Console and HTML rendering of cached movies.

use crate::cli::args::Detail;
use crate::core::cache::{CacheStore, HTML_SUMMARY_FILE};
use crate::core::guesser::alphanum;
use crate::models::cache::MovieRecord;
use colored::Colorize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// HTML summary cells per table row.
const CELLS_PER_ROW: usize = 5;

/// Print every file with its movie, skipping files without metadata.
pub fn print_listing(files: &[PathBuf], cache: &CacheStore, detail: Detail, outline: bool) {
    for path in files {
        if let Some(record) = cache.record_for_path(path) {
            if let Some(entry) = format_entry(path, record, detail, outline) {
                print!("{}", entry);
            }
        }
    }
}

/// Text block for one file, `None` when its record has no metadata.
pub fn format_entry(path: &Path, record: &MovieRecord, detail: Detail, outline: bool) -> Option<String> {
    record.metadata.id.as_ref()?;
    let m = &record.metadata;

    let header = if record.guess.unsure {
        format!("{} ", "/!\\".red())
    } else {
        String::new()
    };
    let raw_title = m.title.clone().unwrap_or_default();
    let title = if record.has_origin() {
        raw_title.magenta()
    } else {
        raw_title.yellow()
    };
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let rating = display(m.rating);
    let year = display(m.year);
    let size = record
        .byte_size
        .map(|b| (b / (1024 * 1024)).to_string())
        .unwrap_or_else(|| "None".to_string());
    let genres = m.genres.join(", ");
    let directors = m.directors.join(", ");

    let mut out = String::new();
    match detail {
        Detail::VeryLong => {
            let _ = writeln!(out, "{}{} ({}: {})", header, title, "rating".blue(), rating);
            let _ = writeln!(out, "{}: {} {}: {}", "year".blue(), year, "genre".blue(), genres);
            let _ = writeln!(out, "{}: {} {}: {}Mo", "file".blue(), filename, "size".blue(), size);
            let _ = writeln!(out, "{}: {}", "director".blue(), directors);

            let cast_header = "cast: ";
            let _ = write!(out, "{}: ", "cast".blue());
            for (i, actor) in m.cast.iter().enumerate() {
                if i > 0 {
                    out.push_str(&" ".repeat(cast_header.len()));
                }
                let _ = writeln!(out, "{}", actor);
            }
            if m.cast.is_empty() {
                out.push('\n');
            }
            let _ = writeln!(
                out,
                "\n{}: {}\n---",
                "summary".blue(),
                m.summary.as_deref().unwrap_or_default()
            );
        }
        Detail::Long => {
            let _ = writeln!(
                out,
                "{}{} ({},{},{}Mo) [{}] from {}: {}",
                header,
                title,
                year,
                rating,
                size,
                genres.blue(),
                directors,
                filename
            );
        }
        Detail::Short => {
            let _ = writeln!(out, "{}{} ({})", header, title, filename);
        }
    }

    if outline {
        if let Some(short) = m.short_summary.as_deref().filter(|s| !s.is_empty()) {
            let _ = writeln!(out, "*** {}", short);
        }
    }

    Some(out)
}

fn display<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "None".to_string())
}

/// HTML table summarizing the files, five movies per row.
pub fn html_summary(files: &[PathBuf], cache: &CacheStore) -> String {
    let mut html = String::from("<html><head><meta charset=\"utf-8\"></head><body>\n<table>\n");

    for (count, path) in files.iter().enumerate() {
        if count % CELLS_PER_ROW == 0 {
            if count > 0 {
                html.push_str("</tr>\n");
            }
            html.push_str("<tr height=200>\n");
        }

        let Some(record) = cache.record_for_path(path) else {
            continue;
        };
        let m = &record.metadata;
        let Some(id) = m.id.as_deref() else {
            continue;
        };

        let title = m.title.as_deref().unwrap_or_default();
        let filename: String = path
            .file_name()
            .map(|n| n.to_string_lossy().chars().take(20).collect())
            .unwrap_or_default();
        let size = if path.exists() {
            record.size_mb().map(|s| (s * 10.0).round() / 10.0).unwrap_or(0.0)
        } else {
            0.0
        };
        let votes = m
            .votes
            .filter(|v| *v > 0)
            .map(|v| format!("{:.1}K", v as f64 / 1000.0))
            .unwrap_or_else(|| "None".to_string());
        let color = if record.guess.unsure { "#FF3333" } else { "#808080" };
        let genres: Vec<&str> = m.genres.iter().take(2).map(String::as_str).collect();
        let trailer = format!(
            "http://www.youtube.com/results?search_query={}+trailer",
            alphanum(title, "+")
        );

        let _ = writeln!(
            html,
            "<td width=200 height=250><a href=\"http://www.imdb.com/title/tt{}\">{}</a><br>\
             <font color={}>{}<br>note: {}, votes: {}<br>size: {}Mo</font><br>\
             <a href='{}'><img src='{}' height=150></a><br><small>{}</small></td>",
            escape_html(id),
            escape_html(title),
            color,
            escape_html(&genres.join(", ")),
            display(m.rating),
            votes,
            size,
            escape_html(&trailer),
            escape_html(m.cover_url.as_deref().unwrap_or_default()),
            escape_html(&filename)
        );
    }

    html.push_str("</tr></table>\n</body></html>\n");
    html
}

/// Write the HTML summary into the cache directory and return its path.
pub fn write_html_summary(files: &[PathBuf], cache: &CacheStore) -> crate::Result<PathBuf> {
    let path = cache.dir().join(HTML_SUMMARY_FILE);
    std::fs::write(&path, html_summary(files, cache))?;
    tracing::info!("HTML summary written to {}", path.display());
    Ok(path)
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
