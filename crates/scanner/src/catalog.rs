//! Library catalog: walk the media tree and describe the video files in it.
//!
//! A catalog entry bundles everything a client needs to render one movie:
//! file facts (size, mtime), technical metadata from the probe, descriptive
//! metadata from the `movie.nfo` sidecar, artwork links and subtitles.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use cinevault_core::types::ImageKind;
use cinevault_metadata::store;
use serde::Serialize;
use tracing::warn;

use crate::classify::{is_video_file, should_ignore};
use crate::probe::{TechnicalMetadata, VideoProbe};
use crate::subtitles::{self, SubtitleRecord};

/// Filters applied while walking the library tree.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Prune any directory whose path contains one of these names
    /// (case-insensitive substring match per path segment).
    pub exclude_dir_names: Vec<String>,
    /// Keep only videos under a top-level directory starting with this name,
    /// e.g. `"films"`.
    pub only_under_dir_name: Option<String>,
}

/// One video file in the library.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub name: String,
    /// Path relative to the library root, `/`-separated.
    pub relative_path: String,
    /// Title from the sidecar when present, file stem otherwise.
    pub display_name: String,
    /// Containing directory relative to the library root, `""` at the root.
    pub directory: String,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
    pub technical: TechnicalMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptive: Option<DescriptiveMetadata>,
    pub images: ImageLinks,
    pub subtitles: Vec<SubtitleRecord>,
}

/// Human-facing metadata lifted from the `movie.nfo` sidecar.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptiveMetadata {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_language: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub spoken_languages: Vec<String>,
}

/// Artwork files present in the movie directory, by canonical name.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fanart: Option<String>,
}

impl ImageLinks {
    fn for_dir(movie_dir: &Path) -> Self {
        let present = |kind: ImageKind| {
            let name = kind.file_name();
            movie_dir.join(name).is_file().then(|| name.to_string())
        };
        Self {
            poster: present(ImageKind::Poster),
            fanart: present(ImageKind::Fanart),
        }
    }
}

/// Walk `root` and describe every video file that passes the filters,
/// newest first.
pub async fn scan(
    root: &Path,
    opts: &ScanOptions,
    probe: Option<&dyn VideoProbe>,
) -> Vec<CatalogEntry> {
    let mut paths = Vec::new();
    collect_videos(root, root, opts, &mut paths);

    let mut entries = Vec::with_capacity(paths.len());
    for path in paths {
        if let Some(entry) = build_entry(root, &path, probe).await {
            entries.push(entry);
        }
    }
    entries.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
    entries
}

/// Describe a single video by its path relative to the library root.
/// Returns `None` when the path is missing or not a video file.
pub async fn describe_video(
    root: &Path,
    relative_path: &Path,
    probe: Option<&dyn VideoProbe>,
) -> Option<CatalogEntry> {
    let path = root.join(relative_path);
    let name = path.file_name()?.to_string_lossy().into_owned();
    if !is_video_file(&name) || !path.is_file() {
        return None;
    }
    build_entry(root, &path, probe).await
}

fn collect_videos(dir: &Path, root: &Path, opts: &ScanOptions, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "cannot read directory, skipping");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if should_ignore(&name) {
            continue;
        }
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        if path.is_dir() {
            if passes_filters(rel, opts) {
                collect_videos(&path, root, opts, out);
            }
        } else if is_video_file(&name)
            && passes_filters(rel.parent().unwrap_or(Path::new("")), opts)
        {
            out.push(path);
        }
    }
}

/// Filter a directory path (relative to the root) against the scan options.
/// Files are checked against their parent directory.
fn passes_filters(rel_dir: &Path, opts: &ScanOptions) -> bool {
    let segments: Vec<String> = rel_dir
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
        .collect();

    for needle in &opts.exclude_dir_names {
        let needle = needle.to_lowercase();
        if segments.iter().any(|s| s.contains(&needle)) {
            return false;
        }
    }

    if let Some(section) = &opts.only_under_dir_name {
        let section = section.to_lowercase();
        match segments.first() {
            Some(first) if first.starts_with(&section) => {}
            _ => return false,
        }
    }

    true
}

async fn build_entry(
    root: &Path,
    path: &Path,
    probe: Option<&dyn VideoProbe>,
) -> Option<CatalogEntry> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot stat video, skipping");
            return None;
        }
    };

    let name = path.file_name()?.to_string_lossy().into_owned();
    let stem = path.file_stem()?.to_string_lossy().into_owned();
    let rel = path.strip_prefix(root).ok()?;

    let modified_at = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or(DateTime::UNIX_EPOCH);

    let movie_dir = path.parent()?;
    let nfo = store::read_nfo(movie_dir);

    let display_name = nfo
        .as_ref()
        .map(|n| n.display_title.clone())
        .unwrap_or(stem);

    let descriptive = nfo.as_ref().map(|n| {
        let tmdb = n.tmdb.as_ref();
        DescriptiveMetadata {
            title: n.display_title.clone(),
            year: n.display_year.or(n.extracted_year),
            overview: tmdb.and_then(|t| t.overview.clone()),
            rating: tmdb.and_then(|t| t.vote_average),
            genres: tmdb.map(|t| t.genres.clone()).unwrap_or_default(),
            original_language: tmdb.and_then(|t| t.original_language.clone()),
            spoken_languages: tmdb.map(|t| t.spoken_languages.clone()).unwrap_or_default(),
        }
    });

    // A failed probe still yields an entry; file facts come from the stat.
    let technical = match probe {
        Some(p) => p.probe(path).await.unwrap_or_default(),
        None => TechnicalMetadata::default(),
    };

    Some(CatalogEntry {
        name,
        relative_path: rel_string(rel),
        display_name,
        directory: rel.parent().map(rel_string).unwrap_or_default(),
        size_bytes: meta.len(),
        modified_at,
        technical,
        descriptive,
        images: ImageLinks::for_dir(movie_dir),
        subtitles: subtitles::scan_movie_subtitles(movie_dir),
    })
}

fn rel_string(p: &Path) -> String {
    p.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cv_catalog_{}_{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"data").unwrap();
    }

    #[tokio::test]
    async fn scan_excludes_ingest_directories() {
        let root = temp_root("exclude");
        touch(&root.join("films/Heat (1995)/Heat (1995).mp4"));
        touch(&root.join("downloads/Heat.1995.mp4"));
        touch(&root.join("old-downloads-bak/Heat.1995.mp4"));

        let opts = ScanOptions {
            exclude_dir_names: vec!["downloads".into()],
            ..Default::default()
        };
        let entries = scan(&root, &opts, None).await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].relative_path, "films/Heat (1995)/Heat (1995).mp4");
        assert_eq!(entries[0].directory, "films/Heat (1995)");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn scan_can_restrict_to_one_section() {
        let root = temp_root("films_only");
        touch(&root.join("films/Ran (1985)/Ran (1985).mkv"));
        touch(&root.join("series/Show/episode.mkv"));
        touch(&root.join("stray.mkv"));

        let opts = ScanOptions {
            only_under_dir_name: Some("films".into()),
            ..Default::default()
        };
        let entries = scan(&root, &opts, None).await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Ran (1985).mkv");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn scan_sorts_newest_first() {
        let root = temp_root("sort");
        touch(&root.join("films/A (2001)/A (2001).mp4"));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        touch(&root.join("films/B (2002)/B (2002).mp4"));

        let entries = scan(&root, &ScanOptions::default(), None).await;

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "B (2002).mp4");
        assert_eq!(entries[1].name, "A (2001).mp4");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn entry_carries_sidecar_and_subtitles() {
        let root = temp_root("sidecar");
        let movie_dir = root.join("films/The Matrix (1999)");
        touch(&movie_dir.join("The Matrix (1999).mp4"));
        touch(&movie_dir.join("poster.jpg"));
        touch(&movie_dir.join("Subs/The.Matrix.1999.en.srt"));

        let nfo_json = serde_json::json!({
            "originalName": "The.Matrix.1999.1080p.mp4",
            "extractedTitle": "The Matrix",
            "extractedYear": 1999,
            "processedDate": "2024-05-01T12:00:00Z",
            "displayTitle": "The Matrix",
            "displayYear": 1999,
            "folderName": "The Matrix (1999)",
            "tmdb": {
                "id": 603,
                "title": "The Matrix",
                "voteAverage": 8.2,
                "genres": ["Action", "Science Fiction"]
            }
        });
        std::fs::write(movie_dir.join(store::NFO_FILE_NAME), nfo_json.to_string()).unwrap();

        let entries = scan(&root, &ScanOptions::default(), None).await;
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert_eq!(entry.display_name, "The Matrix");
        assert_eq!(entry.name, "The Matrix (1999).mp4");
        assert!(entry.size_bytes > 0);

        let desc = entry.descriptive.as_ref().unwrap();
        assert_eq!(desc.title, "The Matrix");
        assert_eq!(desc.year, Some(1999));
        assert_eq!(desc.rating, Some(8.2));
        assert_eq!(desc.genres, vec!["Action", "Science Fiction"]);

        assert_eq!(entry.images.poster.as_deref(), Some("poster.jpg"));
        assert!(entry.images.fanart.is_none());

        assert_eq!(entry.subtitles.len(), 1);
        assert_eq!(entry.subtitles[0].language_tag, "en");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn entry_without_sidecar_falls_back_to_stem() {
        let root = temp_root("bare");
        touch(&root.join("films/Some.Movie.2020.1080p.mp4"));

        let entries = scan(&root, &ScanOptions::default(), None).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].display_name, "Some.Movie.2020.1080p");
        assert!(entries[0].descriptive.is_none());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn describe_rejects_non_video_paths() {
        let root = temp_root("describe");
        touch(&root.join("films/Alien (1979)/Alien (1979).mp4"));
        touch(&root.join("films/Alien (1979)/notes.txt"));

        let found =
            describe_video(&root, Path::new("films/Alien (1979)/Alien (1979).mp4"), None).await;
        assert!(found.is_some());

        let not_video =
            describe_video(&root, Path::new("films/Alien (1979)/notes.txt"), None).await;
        assert!(not_video.is_none());

        let missing =
            describe_video(&root, Path::new("films/Alien (1979)/gone.mp4"), None).await;
        assert!(missing.is_none());

        let _ = std::fs::remove_dir_all(&root);
    }
}
