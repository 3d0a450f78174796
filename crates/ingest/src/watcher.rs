//! Filesystem watcher feeding the ingestion pipeline.
//!
//! A download in progress emits a burst of modify events while it grows, so
//! events are debounced per path and only the tail of a burst is handed to
//! the pipeline. The stability gate then confirms the file has settled.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cinevault_core::types::FileRole;
use cinevault_scanner::classify::{classify, is_video_file, should_ignore};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::IngestError;
use crate::pipeline::IngestionService;

pub struct IngestWatcher {
    service: Arc<IngestionService>,
    roots: Vec<PathBuf>,
    debounce: Duration,
}

impl IngestWatcher {
    pub fn new(service: Arc<IngestionService>, roots: Vec<PathBuf>, debounce: Duration) -> Self {
        Self {
            service,
            roots,
            debounce,
        }
    }

    /// Organize everything already sitting in the watch roots. Runs once at
    /// startup so files dropped while the daemon was down are not missed.
    pub async fn sweep_existing(&self) {
        for root in &self.roots {
            if !root.is_dir() {
                continue;
            }
            let mut videos = Vec::new();
            collect_videos(root, &mut videos);
            if videos.is_empty() {
                continue;
            }
            info!(root = %root.display(), count = videos.len(), "sweeping existing downloads");
            for video in videos {
                self.service.ingest_existing(&video, root).await;
            }
        }
    }

    /// Watch the roots and ingest videos as their event bursts go quiet.
    /// Runs until the event channel closes.
    pub async fn run(self) -> Result<(), IngestError> {
        for root in &self.roots {
            std::fs::create_dir_all(root)?;
        }

        let (tx, mut rx) = mpsc::channel::<PathBuf>(256);
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        for path in event.paths {
                            let _ = tx.blocking_send(path);
                        }
                    }
                }
                Err(e) => error!(error = %e, "watch error"),
            },
            Config::default(),
        )?;

        for root in &self.roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
            info!(root = %root.display(), "watching for downloads");
        }

        let mut pending: HashMap<PathBuf, Instant> = HashMap::new();
        let mut tick = tokio::time::interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                received = rx.recv() => {
                    match received {
                        Some(path) => {
                            if let Some(root) = self.root_of(&path) {
                                if wants(&path, root) {
                                    pending.insert(path, Instant::now() + self.debounce);
                                }
                            }
                        }
                        None => break,
                    }
                }
                _ = tick.tick() => {
                    let now = Instant::now();
                    let due: Vec<PathBuf> = pending
                        .iter()
                        .filter(|(_, at)| **at <= now)
                        .map(|(p, _)| p.clone())
                        .collect();
                    for path in due {
                        pending.remove(&path);
                        let Some(root) = self.root_of(&path) else {
                            continue;
                        };
                        let service = self.service.clone();
                        let root = root.to_path_buf();
                        tokio::spawn(async move {
                            service.ingest_detected(&path, &root).await;
                        });
                    }
                }
            }
        }

        Ok(())
    }

    fn root_of(&self, path: &Path) -> Option<&Path> {
        self.roots
            .iter()
            .find(|root| path.starts_with(root))
            .map(PathBuf::as_path)
    }
}

/// A path is worth ingesting when it is a video and no component under the
/// root is an ignorable name (hidden files, `.part` leftovers).
fn wants(path: &Path, root: &Path) -> bool {
    let Ok(rel) = path.strip_prefix(root) else {
        return false;
    };
    for component in rel.components() {
        if should_ignore(&component.as_os_str().to_string_lossy()) {
            return false;
        }
    }
    classify(path) == FileRole::Video
}

fn collect_videos(dir: &Path, out: &mut Vec<PathBuf>) {
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
        if path.is_dir() {
            collect_videos(&path, out);
        } else if is_video_file(&name) {
            out.push(path);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wants_only_clean_videos_under_the_root() {
        let root = Path::new("/drop");
        assert!(wants(Path::new("/drop/Movie.2020.mkv"), root));
        assert!(wants(Path::new("/drop/Release/Movie.2020.mkv"), root));
        assert!(!wants(Path::new("/drop/Movie.2020.mkv.part"), root));
        assert!(!wants(Path::new("/drop/.stash/Movie.2020.mkv"), root));
        assert!(!wants(Path::new("/drop/notes.txt"), root));
        assert!(!wants(Path::new("/elsewhere/Movie.2020.mkv"), root));
    }
}
