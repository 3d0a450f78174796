//! `movie.nfo` sidecar read/write.
//!
//! Each organized movie folder carries a JSON sidecar recording where the
//! file came from, what we extracted from its name, and the provider match
//! (when one was found). The catalog reads it back to enrich listings.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

pub const NFO_FILE_NAME: &str = "movie.nfo";

/// Sidecar record written next to an organized movie file.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieNfo {
    pub original_name: String,
    pub extracted_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_year: Option<u16>,
    pub processed_date: DateTime<Utc>,
    pub display_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_year: Option<u16>,
    pub folder_name: String,
    #[serde(default)]
    pub images: NfoImages,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmdb: Option<TmdbInfo>,
}

/// Artwork files saved alongside the movie, by file name.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NfoImages {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fanart: Option<String>,
}

/// Provider match captured at organization time.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TmdbInfo {
    pub id: u64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote_average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub adult: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backdrop_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_language: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spoken_languages: Vec<String>,
}

/// Read the sidecar for a movie folder, if present and parseable.
///
/// A malformed sidecar is logged and treated as absent; the movie still
/// serves fine without it.
pub fn read_nfo(movie_dir: &Path) -> Option<MovieNfo> {
    let path = movie_dir.join(NFO_FILE_NAME);

    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "could not read nfo");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(nfo) => Some(nfo),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed nfo");
            None
        }
    }
}

/// Write (or rewrite) the sidecar for a movie folder.
pub fn write_nfo(movie_dir: &Path, nfo: &MovieNfo) -> std::io::Result<()> {
    let path = movie_dir.join(NFO_FILE_NAME);
    let json = serde_json::to_string_pretty(nfo)?;
    fs::write(&path, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn temp_movie_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("cv_nfo_test_{}_{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_nfo() -> MovieNfo {
        MovieNfo {
            original_name: "The.Matrix.1999.1080p.mkv".into(),
            extracted_title: "The Matrix".into(),
            extracted_year: Some(1999),
            processed_date: Utc::now(),
            display_title: "The Matrix".into(),
            display_year: Some(1999),
            folder_name: "The Matrix (1999)".into(),
            images: NfoImages::default(),
            tmdb: Some(TmdbInfo {
                id: 603,
                title: "The Matrix".into(),
                vote_average: Some(8.2),
                genres: vec!["Action".into(), "Science Fiction".into()],
                ..Default::default()
            }),
        }
    }

    #[test]
    fn nfo_round_trips() {
        let dir = temp_movie_dir("roundtrip");
        let nfo = sample_nfo();
        write_nfo(&dir, &nfo).unwrap();

        // Keys are camelCase on disk, matching the sidecar format.
        let raw = std::fs::read_to_string(dir.join(NFO_FILE_NAME)).unwrap();
        assert!(raw.contains("\"originalName\""));
        assert!(raw.contains("\"displayTitle\""));
        assert!(raw.contains("\"voteAverage\""));

        let back = read_nfo(&dir).unwrap();
        assert_eq!(back, nfo);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_nfo_reads_as_none() {
        let dir = temp_movie_dir("missing");
        assert!(read_nfo(&dir).is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn malformed_nfo_reads_as_none() {
        let dir = temp_movie_dir("malformed");
        std::fs::write(dir.join(NFO_FILE_NAME), "{ not json").unwrap();
        assert!(read_nfo(&dir).is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn nfo_without_optional_blocks_still_parses() {
        let dir = temp_movie_dir("minimal");
        let raw = serde_json::json!({
            "originalName": "Solaris.1972.mkv",
            "extractedTitle": "Solaris",
            "extractedYear": 1972,
            "processedDate": "2024-03-01T12:00:00Z",
            "displayTitle": "Solaris",
            "displayYear": 1972,
            "folderName": "Solaris (1972)"
        });
        std::fs::write(dir.join(NFO_FILE_NAME), raw.to_string()).unwrap();

        let nfo = read_nfo(&dir).unwrap();
        assert_eq!(nfo.display_title, "Solaris");
        assert!(nfo.tmdb.is_none());
        assert!(nfo.images.poster.is_none());

        std::fs::remove_dir_all(&dir).ok();
    }
}
