//! Write-stability gate for files that may still be downloading.
//!
//! A freshly detected file is only safe to move once its size and mtime stop
//! changing. The gate samples twice with a pause in between and calls the
//! file stable when both samples agree.

use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct StabilityGate {
    /// Pause between the two size/mtime samples.
    pub quiesce: Duration,
    /// How many rounds `wait_until_stable` tries before giving up.
    pub max_attempts: u32,
    /// Pause between rounds.
    pub retry_delay: Duration,
}

impl Default for StabilityGate {
    fn default() -> Self {
        Self {
            quiesce: Duration::from_secs(2),
            max_attempts: 5,
            retry_delay: Duration::from_secs(5),
        }
    }
}

impl StabilityGate {
    /// One stability check: two samples, `quiesce` apart, must agree on
    /// (size, mtime). Any stat failure counts as unstable.
    pub async fn is_stable(&self, path: &Path) -> bool {
        let Some(first) = sample(path) else {
            return false;
        };
        tokio::time::sleep(self.quiesce).await;
        let Some(second) = sample(path) else {
            return false;
        };
        first == second
    }

    /// Retry `is_stable` up to `max_attempts` times. False means the file
    /// never settled: still downloading, or gone.
    pub async fn wait_until_stable(&self, path: &Path) -> bool {
        for attempt in 1..=self.max_attempts {
            if self.is_stable(path).await {
                return true;
            }
            if attempt < self.max_attempts {
                debug!(path = %path.display(), attempt, "file not stable yet, retrying");
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        warn!(
            path = %path.display(),
            attempts = self.max_attempts,
            "file never stabilized"
        );
        false
    }
}

fn sample(path: &Path) -> Option<(u64, SystemTime)> {
    let meta = std::fs::metadata(path).ok()?;
    let modified = meta.modified().ok()?;
    Some((meta.len(), modified))
}
