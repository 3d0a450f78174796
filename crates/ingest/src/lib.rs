//! Ingestion daemon: watches drop directories and organizes finished
//! downloads into the movie library.

pub mod pipeline;
pub mod watcher;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}
