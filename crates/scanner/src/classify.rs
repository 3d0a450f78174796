use std::path::Path;
use std::sync::LazyLock;

use cinevault_core::types::FileRole;
use regex::Regex;

/// Parsed movie info from a release file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieInfo {
    pub title: String,
    pub year: Option<u16>,
}

static VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v"];

static SUBTITLE_EXTENSIONS: &[&str] = &["srt", "vtt", "ass", "ssa", "sub"];

static IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif"];

static INFO_EXTENSIONS: &[&str] = &["txt", "nfo", "info"];

// Exact names to skip wherever they appear
static IGNORE_NAMES: &[&str] = &[".DS_Store", "Thumbs.db"];

// In-progress download artifacts
static IGNORE_SUFFIXES: &[&str] = &[".tmp", ".part", ".crdownload"];

// First four-digit run in a name is taken as the release year
static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());

// Dots, dashes and underscores double as word separators in release names
static RE_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.\-_\s]+").unwrap());

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Role a file plays in a movie folder, judged by extension alone.
pub fn classify(path: &Path) -> FileRole {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_ascii_lowercase(),
        None => return FileRole::Unsupported,
    };

    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        FileRole::Video
    } else if SUBTITLE_EXTENSIONS.contains(&ext.as_str()) {
        FileRole::Subtitle
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        FileRole::Image
    } else if INFO_EXTENSIONS.contains(&ext.as_str()) {
        FileRole::Info
    } else {
        FileRole::Unsupported
    }
}

/// Check if a file has a video extension.
pub fn is_video_file(filename: &str) -> bool {
    classify(Path::new(filename)) == FileRole::Video
}

/// Check if a name should be skipped entirely: hidden files, OS droppings,
/// and half-finished download artifacts.
pub fn should_ignore(filename: &str) -> bool {
    if filename.starts_with('.') {
        return true;
    }
    if IGNORE_NAMES.iter().any(|n| n.eq_ignore_ascii_case(filename)) {
        return true;
    }
    let lower = filename.to_ascii_lowercase();
    IGNORE_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// Pull a title and year out of a release file stem (no extension).
///
/// The first four-digit run is taken as the year and everything before it
/// as the title, so a stem that opens with the year ("1984") parses to an
/// empty title.
pub fn extract_movie_info(stem: &str) -> MovieInfo {
    match RE_YEAR.find(stem) {
        Some(m) => MovieInfo {
            title: clean_title(&stem[..m.start()]),
            year: m.as_str().parse().ok(),
        },
        None => MovieInfo {
            title: clean_title(stem),
            year: None,
        },
    }
}

/// Clean up a title: collapse separator runs into spaces, trim.
fn clean_title(raw: &str) -> String {
    RE_SEPARATORS.replace_all(raw, " ").trim().to_string()
}

/// Make a display title safe to use as a folder name.
pub fn sanitize_folder_name(name: &str) -> String {
    let filtered: String = name
        .chars()
        .filter(|c| {
            !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') && !c.is_control()
        })
        .collect();
    let collapsed = RE_WHITESPACE.replace_all(&filtered, " ");
    collapsed.trim().trim_end_matches(['.', ' ']).to_string()
}

/// Canonical library folder name: `"Title (Year)"`, or the bare title when
/// no year is known.
pub fn destination_folder_name(title: &str, year: Option<u16>) -> String {
    match year {
        Some(y) => sanitize_folder_name(&format!("{title} ({y})")),
        None => sanitize_folder_name(title),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
