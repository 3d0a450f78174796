//! Organizes detected videos into the canonical library layout.
//!
//! One video runs through: stability gate, release-name parse, provider
//! lookup, relocation into `films/<Title> (<Year>)/`, `movie.nfo` sidecar,
//! artwork download. Metadata and artwork are best effort; only a failed
//! relocation counts as a failure.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use cinevault_core::types::{FileRole, ImageKind};
use cinevault_metadata::provider::{MetadataProvider, MovieCandidate, MovieDetails};
use cinevault_metadata::store::{self, MovieNfo, NfoImages, TmdbInfo};
use cinevault_scanner::classify::{classify, destination_folder_name, extract_movie_info};
use cinevault_scanner::stability::StabilityGate;
use cinevault_scanner::subtitles::SUBS_DIR_NAME;
use tracing::{debug, info, warn};

/// Terminal state of one ingestion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Relocated into the library. Sidecar and artwork are best effort.
    Done,
    /// Never settled; left in place for a later sweep.
    Abandoned,
    /// Relocation failed; the source was left intact.
    Failed,
    /// Not a video, vanished before processing, or already in flight.
    Skipped,
}

pub struct IngestionService {
    movies_dir: PathBuf,
    provider: Option<Arc<dyn MetadataProvider>>,
    gate: StabilityGate,
    in_flight: Mutex<HashSet<PathBuf>>,
}

impl IngestionService {
    pub fn new(
        movies_dir: impl Into<PathBuf>,
        provider: Option<Arc<dyn MetadataProvider>>,
        gate: StabilityGate,
    ) -> Self {
        Self {
            movies_dir: movies_dir.into(),
            provider,
            gate,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Ingest a video signalled by the filesystem watcher. Waits for the
    /// file to stop changing before touching it.
    pub async fn ingest_detected(&self, video: &Path, watch_root: &Path) -> IngestOutcome {
        self.process(video, watch_root, true).await
    }

    /// Ingest a video found by a startup sweep. The file is assumed settled.
    pub async fn ingest_existing(&self, video: &Path, watch_root: &Path) -> IngestOutcome {
        self.process(video, watch_root, false).await
    }

    async fn process(&self, video: &Path, watch_root: &Path, gated: bool) -> IngestOutcome {
        if classify(video) != FileRole::Video {
            return IngestOutcome::Skipped;
        }
        let source = IngestSource::locate(video, watch_root);
        if !self.begin(source.key()) {
            return IngestOutcome::Skipped;
        }
        let outcome = self.run(&source, gated).await;
        self.finish(source.key());
        outcome
    }

    async fn run(&self, source: &IngestSource, gated: bool) -> IngestOutcome {
        let video = source.video();

        if gated && !self.gate.wait_until_stable(video).await {
            warn!(path = %video.display(), "file never settled, leaving for a later sweep");
            return IngestOutcome::Abandoned;
        }
        if !video.exists() {
            return IngestOutcome::Skipped;
        }

        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let info = extract_movie_info(&stem);
        info!(path = %video.display(), title = %info.title, year = ?info.year, "ingesting video");

        let lookup = self.lookup(&info.title).await;

        let display_title = lookup
            .as_ref()
            .map(|l| l.display_title().to_string())
            .unwrap_or_else(|| info.title.clone());
        let display_year = lookup.as_ref().and_then(LookupResult::display_year).or(info.year);

        let folder_name = destination_folder_name(&display_title, display_year);
        let dest_dir = self.movies_dir.join(&folder_name);

        let relocated = match source {
            IngestSource::Bare { video } => relocate_bare(video, &dest_dir, &folder_name),
            IngestSource::Folder { dir, .. } => relocate_folder(dir, &dest_dir),
        };
        if let Err(e) = relocated {
            warn!(
                error = %e,
                dest = %dest_dir.display(),
                "relocation failed, source left in place"
            );
            return IngestOutcome::Failed;
        }

        let mut nfo = MovieNfo {
            original_name: video
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            extracted_title: info.title,
            extracted_year: info.year,
            processed_date: Utc::now(),
            display_title,
            display_year,
            folder_name,
            images: NfoImages::default(),
            tmdb: lookup.as_ref().map(|l| l.tmdb_info()),
        };

        if let Err(e) = store::write_nfo(&dest_dir, &nfo) {
            warn!(error = %e, dir = %dest_dir.display(), "cannot write nfo, skipping image downloads");
            return IngestOutcome::Done;
        }

        if let Some(lookup) = &lookup {
            let images = self.fetch_images(lookup, &dest_dir).await;
            if images.poster.is_some() || images.fanart.is_some() {
                nfo.images = images;
                if let Err(e) = store::write_nfo(&dest_dir, &nfo) {
                    warn!(error = %e, dir = %dest_dir.display(), "cannot update nfo with image names");
                }
            }
        }

        info!(dir = %dest_dir.display(), "organized into library");
        IngestOutcome::Done
    }

    fn begin(&self, key: &Path) -> bool {
        self.in_flight.lock().unwrap().insert(key.to_path_buf())
    }

    fn finish(&self, key: &Path) {
        self.in_flight.lock().unwrap().remove(key);
    }

    async fn lookup(&self, title: &str) -> Option<LookupResult> {
        let provider = self.provider.as_ref()?;
        if title.is_empty() {
            return None;
        }

        let candidate = match provider.search(title).await {
            Ok(Some(c)) => c,
            Ok(None) => {
                info!(title = %title, provider = provider.name(), "no metadata match");
                return None;
            }
            Err(e) => {
                warn!(title = %title, provider = provider.name(), error = %e, "metadata search failed");
                return None;
            }
        };

        let details = match provider.details(candidate.id).await {
            Ok(d) => d,
            Err(e) => {
                warn!(id = candidate.id, provider = provider.name(), error = %e, "details fetch failed");
                None
            }
        };

        Some(LookupResult { candidate, details })
    }

    /// Download poster and backdrop into the movie directory. Each image is
    /// independent; a failed download is logged and skipped.
    async fn fetch_images(&self, lookup: &LookupResult, dest_dir: &Path) -> NfoImages {
        let Some(provider) = self.provider.as_ref() else {
            return NfoImages::default();
        };

        let mut images = NfoImages::default();
        for kind in [ImageKind::Poster, ImageKind::Fanart] {
            let Some(remote) = lookup.image_path(kind) else {
                continue;
            };
            match provider.fetch_image(remote).await {
                Ok(bytes) => {
                    let file_name = kind.file_name();
                    if let Err(e) = std::fs::write(dest_dir.join(file_name), bytes) {
                        warn!(error = %e, image = %kind, "cannot write image file");
                        continue;
                    }
                    match kind {
                        ImageKind::Poster => images.poster = Some(file_name.to_string()),
                        ImageKind::Fanart => images.fanart = Some(file_name.to_string()),
                    }
                }
                Err(e) => {
                    warn!(error = %e, image = %kind, "image download failed");
                }
            }
        }
        images
    }
}

/// Where the video sits relative to the watch root: loose in the root, or
/// inside a release folder that moves wholesale.
enum IngestSource {
    Bare { video: PathBuf },
    Folder { dir: PathBuf, video: PathBuf },
}

impl IngestSource {
    fn locate(video: &Path, watch_root: &Path) -> Self {
        match video.parent() {
            Some(parent) if parent != watch_root && parent.starts_with(watch_root) => {
                Self::Folder {
                    dir: parent.to_path_buf(),
                    video: video.to_path_buf(),
                }
            }
            _ => Self::Bare {
                video: video.to_path_buf(),
            },
        }
    }

    /// Dedup key: the unit that moves.
    fn key(&self) -> &Path {
        match self {
            Self::Bare { video } => video,
            Self::Folder { dir, .. } => dir,
        }
    }

    fn video(&self) -> &Path {
        match self {
            Self::Bare { video } | Self::Folder { video, .. } => video,
        }
    }
}

/// Provider responses for one movie. Details win over the search candidate
/// when both carry a field.
struct LookupResult {
    candidate: MovieCandidate,
    details: Option<MovieDetails>,
}

impl LookupResult {
    fn display_title(&self) -> &str {
        self.details
            .as_ref()
            .map(|d| d.title.as_str())
            .unwrap_or(&self.candidate.title)
    }

    fn display_year(&self) -> Option<u16> {
        self.details.as_ref().and_then(|d| d.year).or(self.candidate.year)
    }

    fn image_path(&self, kind: ImageKind) -> Option<&str> {
        let d = self.details.as_ref();
        let c = &self.candidate;
        match kind {
            ImageKind::Poster => d
                .and_then(|d| d.poster_path.as_deref())
                .or(c.poster_path.as_deref()),
            ImageKind::Fanart => d
                .and_then(|d| d.backdrop_path.as_deref())
                .or(c.backdrop_path.as_deref()),
        }
    }

    fn tmdb_info(&self) -> TmdbInfo {
        let c = &self.candidate;
        let d = self.details.as_ref();
        TmdbInfo {
            id: c.id,
            title: self.display_title().to_string(),
            original_title: d
                .and_then(|d| d.original_title.clone())
                .or_else(|| c.original_title.clone()),
            overview: d
                .and_then(|d| d.overview.clone())
                .or_else(|| c.overview.clone()),
            release_date: d
                .and_then(|d| d.release_date.clone())
                .or_else(|| c.release_date.clone()),
            year: self.display_year(),
            vote_average: d.and_then(|d| d.vote_average).or(c.vote_average),
            vote_count: d.and_then(|d| d.vote_count).or(c.vote_count),
            popularity: d.and_then(|d| d.popularity).or(c.popularity),
            adult: c.adult,
            genres: d.map(|d| d.genres.clone()).unwrap_or_default(),
            poster_path: d
                .and_then(|d| d.poster_path.clone())
                .or_else(|| c.poster_path.clone()),
            backdrop_path: d
                .and_then(|d| d.backdrop_path.clone())
                .or_else(|| c.backdrop_path.clone()),
            original_language: d
                .and_then(|d| d.original_language.clone())
                .or_else(|| c.original_language.clone()),
            spoken_languages: d.map(|d| d.spoken_languages.clone()).unwrap_or_default(),
        }
    }
}

/// Move a loose video into `dest_dir`, renamed after the folder, and sweep
/// any sibling subtitle files along into `Subs/`.
fn relocate_bare(video: &Path, dest_dir: &Path, folder_name: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(dest_dir)?;

    let ext = video
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let target = dest_dir.join(format!("{folder_name}.{ext}"));
    move_file(video, &target)?;

    sweep_sibling_subtitles(video, dest_dir);
    Ok(())
}

/// Move a release folder wholesale. Inner file names and modification
/// times are preserved.
fn relocate_folder(source_dir: &Path, dest_dir: &Path) -> std::io::Result<()> {
    copy_dir_recursive(source_dir, dest_dir)?;
    std::fs::remove_dir_all(source_dir)?;
    Ok(())
}

/// Copy then delete; drop directories often live on a different filesystem
/// than the library, where rename(2) does not work.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::copy(from, to)?;
    std::fs::remove_file(from)?;
    Ok(())
}

fn copy_dir_recursive(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
            copy_mtime(&entry.path(), &target);
        }
    }
    Ok(())
}

/// Keep the source's modification time on the copy; the catalog sorts by
/// mtime, so a relocation must not reorder it.
fn copy_mtime(from: &Path, to: &Path) {
    let modified = match std::fs::metadata(from).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(_) => return,
    };
    let set = std::fs::OpenOptions::new()
        .write(true)
        .open(to)
        .and_then(|f| f.set_modified(modified));
    if let Err(e) = set {
        debug!(path = %to.display(), error = %e, "could not preserve mtime");
    }
}

/// Subtitles dropped next to a loose video (same stem prefix) follow it
/// into the library's `Subs/` folder. Failures are logged per file.
fn sweep_sibling_subtitles(video: &Path, dest_dir: &Path) {
    let Some(parent) = video.parent() else {
        return;
    };
    let Some(stem) = video.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
        return;
    };

    let entries = match std::fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    let subs_dir = dest_dir.join(SUBS_DIR_NAME);
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || classify(&path) != FileRole::Subtitle {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(&stem) {
            continue;
        }
        let moved = std::fs::create_dir_all(&subs_dir)
            .and_then(|_| move_file(&path, &subs_dir.join(&name)));
        if let Err(e) = moved {
            warn!(path = %path.display(), error = %e, "cannot move sidecar subtitle");
        }
    }
}
