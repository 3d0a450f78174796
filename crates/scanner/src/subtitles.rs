//! Sidecar subtitle discovery under a movie's `Subs/` folder.
//!
//! Naming conventions:
//! - `Movie.fr.srt`      → language tag "fr"
//! - `Movie.French.srt`  → language tag "fr" (name hint)
//! - `Movie.srt`         → language tag "unknown"
//!
//! Supported extensions: .srt, .vtt, .ass, .ssa, .sub

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Folder organized subtitles live in, next to the movie file.
pub const SUBS_DIR_NAME: &str = "Subs";

/// A subtitle file found under `Subs/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleRecord {
    pub file_name: String,
    /// Path relative to the movie folder, e.g. `Subs/movie.fr.srt`.
    pub relative_path: String,
    /// Best-effort guess; `"unknown"` when nothing in the name matched.
    pub language_tag: String,
    pub format: SubtitleFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Srt,
    Vtt,
    Ass,
    Ssa,
    Sub,
}

impl SubtitleFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "srt" => Some(Self::Srt),
            "vtt" => Some(Self::Vtt),
            "ass" => Some(Self::Ass),
            "ssa" => Some(Self::Ssa),
            "sub" => Some(Self::Sub),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Srt => "application/x-subrip",
            Self::Vtt => "text/vtt",
            Self::Ass | Self::Ssa => "text/x-ssa",
            Self::Sub => "text/plain",
        }
    }
}

// Language-name hints matched against the whole lowercased stem, in order.
static LANGUAGE_HINTS: &[(&str, &[&str])] = &[
    ("fr", &["french", "francais", "fr"]),
    ("en", &["english", "anglais", "en"]),
    ("es", &["spanish", "espagnol", "es"]),
    ("de", &["german", "allemand", "de"]),
    ("it", &["italian", "italien", "it"]),
];

static RE_LANG_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z]{2,3}$").unwrap());

/// Guess a language tag from a subtitle file stem.
fn language_tag(stem: &str) -> String {
    // A trailing dot-segment like "movie.fr" names the language outright.
    if let Some((_, last)) = stem.rsplit_once('.') {
        let last = last.to_ascii_lowercase();
        if RE_LANG_TAG.is_match(&last) {
            return last;
        }
    }

    let lowered = stem.to_ascii_lowercase();
    for (tag, hints) in LANGUAGE_HINTS {
        if hints.iter().any(|h| lowered.contains(h)) {
            return (*tag).to_string();
        }
    }

    // Last resort: the stem's letters stand in for a tag.
    let letters: String = lowered
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(10)
        .collect();
    if letters.is_empty() {
        "unknown".to_string()
    } else {
        letters
    }
}

/// List the subtitles organized under a movie's `Subs/` folder.
///
/// A movie without `Subs/` simply has none; read errors are logged and
/// yield an empty list.
pub fn scan_movie_subtitles(movie_dir: &Path) -> Vec<SubtitleRecord> {
    let subs_dir = movie_dir.join(SUBS_DIR_NAME);
    if !subs_dir.is_dir() {
        return Vec::new();
    }

    let entries = match std::fs::read_dir(&subs_dir) {
        Ok(e) => e,
        Err(e) => {
            warn!(path = %subs_dir.display(), error = %e, "could not list Subs folder");
            return Vec::new();
        }
    };

    let mut results = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(e) => e,
            None => continue,
        };
        let format = match SubtitleFormat::from_extension(ext) {
            Some(f) => f,
            None => continue,
        };

        let (file_name, stem) = match (
            path.file_name().and_then(|s| s.to_str()),
            path.file_stem().and_then(|s| s.to_str()),
        ) {
            (Some(n), Some(s)) => (n.to_string(), s.to_string()),
            _ => continue,
        };

        results.push(SubtitleRecord {
            relative_path: format!("{SUBS_DIR_NAME}/{file_name}"),
            language_tag: language_tag(&stem),
            format,
            file_name,
        });
    }

    results.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn subtitle_format_detection() {
        assert_eq!(SubtitleFormat::from_extension("srt"), Some(SubtitleFormat::Srt));
        assert_eq!(SubtitleFormat::from_extension("SRT"), Some(SubtitleFormat::Srt));
        assert_eq!(SubtitleFormat::from_extension("vtt"), Some(SubtitleFormat::Vtt));
        assert_eq!(SubtitleFormat::from_extension("idx"), None);
    }

    #[test]
    fn tag_from_trailing_segment() {
        assert_eq!(language_tag("The.Matrix.1999.fr"), "fr");
        assert_eq!(language_tag("The.Matrix.1999.ENG"), "eng");
    }

    #[test]
    fn tag_from_name_hint() {
        assert_eq!(language_tag("The Matrix French"), "fr");
        assert_eq!(language_tag("spanish subs"), "es");
    }

    #[test]
    fn tag_falls_back_to_stem_letters() {
        // Languages outside the hint table pass through as-is.
        assert_eq!(language_tag("thai"), "thai");
    }

    #[test]
    fn tag_unknown_when_nothing_matches() {
        assert_eq!(language_tag("0123456789"), "unknown");
    }

    #[test]
    fn scan_lists_subs_folder() {
        let tmp = std::env::temp_dir().join(format!("cv_sub_test_{}", std::process::id()));
        let subs = tmp.join(SUBS_DIR_NAME);
        fs::create_dir_all(&subs).unwrap();

        fs::write(
            subs.join("The.Matrix.1999.fr.srt"),
            "1\n00:00:01,000 --> 00:00:02,000\nBonjour",
        )
        .unwrap();
        fs::write(subs.join("The.Matrix.1999.en.vtt"), "WEBVTT").unwrap();
        fs::write(subs.join("readme.txt"), "not a subtitle").unwrap();

        let records = scan_movie_subtitles(&tmp);
        assert_eq!(records.len(), 2);

        // Sorted by file name, so the .en.vtt comes first.
        assert_eq!(records[0].file_name, "The.Matrix.1999.en.vtt");
        assert_eq!(records[0].relative_path, "Subs/The.Matrix.1999.en.vtt");
        assert_eq!(records[0].language_tag, "en");
        assert_eq!(records[0].format, SubtitleFormat::Vtt);
        assert_eq!(records[1].language_tag, "fr");

        fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn scan_without_subs_folder_is_empty() {
        let tmp = std::env::temp_dir().join(format!("cv_sub_missing_{}", std::process::id()));
        fs::create_dir_all(&tmp).unwrap();

        assert!(scan_movie_subtitles(&tmp).is_empty());
        fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn record_serializes_camel_case() {
        let rec = SubtitleRecord {
            file_name: "movie.fr.srt".into(),
            relative_path: "Subs/movie.fr.srt".into(),
            language_tag: "fr".into(),
            format: SubtitleFormat::Srt,
        };

        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["fileName"], "movie.fr.srt");
        assert_eq!(json["relativePath"], "Subs/movie.fr.srt");
        assert_eq!(json["languageTag"], "fr");
        assert_eq!(json["format"], "srt");
    }
}
