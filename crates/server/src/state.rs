use std::path::PathBuf;
use std::sync::Arc;

use cinevault_scanner::probe::VideoProbe;

/// Directories at the media root where downloads land before they are
/// organized. Hidden from listings unless explicitly requested.
pub const INGEST_DIR_NAMES: &[&str] = &["downloads", "incoming"];

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Root of the media library; every served path resolves under it.
    pub media_root: PathBuf,
    /// Technical metadata prober; `None` runs the catalog without ffprobe.
    pub probe: Option<Arc<dyn VideoProbe>>,
}
