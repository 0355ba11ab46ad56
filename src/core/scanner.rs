//! Gathering of the media files named on the command line.
//!
//! Directories are walked recursively for video files, plain files are
//! taken as given and the single argument `cache` selects every cached path.

use crate::core::cache::CacheStore;
use crate::Result;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Argument selecting every path already in the cache.
pub const CACHE_ARGUMENT: &str = "cache";

/// Video file extensions recognised by OpenSubtitles.
const VIDEO_EXTENSIONS: &[&str] = &[
    "3g2", "3gp", "3gp2", "3gpp", "60d", "ajp", "asf", "asx", "avchd", "avi", "bik", "bix", "box",
    "cam", "dat", "divx", "dmf", "dv", "dvr-ms", "evo", "flc", "fli", "flic", "flv", "flx", "gvi",
    "gvp", "h264", "m1v", "m2p", "m2ts", "m2v", "m4e", "m4v", "mjp", "mjpeg", "mjpg", "mkv", "moov",
    "mov", "movhd", "movie", "movx", "mp4", "mpe", "mpeg", "mpg", "mpv", "mpv2", "mxf", "nsv",
    "nut", "ogg", "ogm", "omf", "ps", "qt", "ram", "rm", "rmvb", "swf", "ts", "vfw", "vid", "video",
    "viv", "vivo", "vob", "vro", "webm", "wm", "wmv", "wmx", "wrap", "wvx", "wx", "x264", "xvid",
];

/// Check if a file extension is a video format.
pub fn is_video_extension(ext: &str) -> bool {
    let ext_lower = ext.to_lowercase();
    VIDEO_EXTENSIONS.contains(&ext_lower.as_str())
}

/// Resolve command line arguments to absolute file paths.
///
/// No argument means the current directory. Arguments that do not exist are
/// skipped with a warning.
pub fn gather_files(args: &[String], cache: &CacheStore) -> Result<Vec<PathBuf>> {
    if args.len() == 1 && args[0] == CACHE_ARGUMENT {
        tracing::info!("Loading all cache entries");
        return Ok(cache.paths.keys().cloned().collect());
    }

    let cwd = std::env::current_dir()?;
    let args: Vec<String> = if args.is_empty() {
        vec![".".to_string()]
    } else {
        args.to_vec()
    };

    let mut files = Vec::new();
    for arg in args.iter().filter(|a| !a.is_empty()) {
        let path = expand_home(arg);
        let path = normalize(&if path.is_absolute() { path } else { cwd.join(path) });

        if path.is_dir() {
            tracing::debug!("Directory to parse: {}", path.display());
            files.extend(video_files_in(&path));
        } else if path.is_file() {
            files.push(path);
        } else {
            tracing::warn!("Skipping {}: no such file or directory", path.display());
        }
    }

    tracing::info!("{} files gathered", files.len());
    Ok(files)
}

/// Video files under a directory, recursively, in file name order.
fn video_files_in(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| is_video_extension(&ext.to_string_lossy()))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect()
}

/// Drop `.` and fold `..` components without touching the file system.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last = normalized.components().next_back();
                let below_root = matches!(last, Some(Component::Normal(_)));
                let at_root = matches!(last, Some(Component::RootDir | Component::Prefix(_)));
                if below_root {
                    normalized.pop();
                } else if !at_root {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Expand a leading `~` to the home directory.
fn expand_home(arg: &str) -> PathBuf {
    if let Some(rest) = arg.strip_prefix('~') {
        if rest.is_empty() || rest.starts_with('/') {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest.trim_start_matches('/'));
            }
        }
    }
    PathBuf::from(arg)
}
