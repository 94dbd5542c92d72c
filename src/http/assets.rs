//! Static asset lookup under a fixed root directory.

use std::path::{Component, Path, PathBuf};

use crate::config::StaticFilesConfig;

#[derive(Debug, Clone)]
pub struct AssetRoot {
    root: PathBuf,
    index: String,
}

impl AssetRoot {
    pub fn new(root: impl Into<PathBuf>, index: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            index: index.into(),
        }
    }

    pub fn from_config(cfg: &StaticFilesConfig) -> Self {
        Self::new(cfg.root.clone(), cfg.index.clone())
    }

    /// Maps a request URL to a file under the root.
    ///
    /// Trailing-slash URLs get the default document appended. Returns `None`
    /// for empty URLs and for URLs that would climb out of the root.
    pub fn resolve(&self, url: &str) -> Option<PathBuf> {
        if url.is_empty() {
            return None;
        }

        let mut relative = url.trim_start_matches('/').to_string();
        if url.ends_with('/') {
            relative.push_str(&self.index);
        }

        let relative = Path::new(&relative);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }

        Some(self.root.join(relative))
    }

    /// Reads the asset for `url` in full.
    ///
    /// Blocks the runtime thread for the duration of the read; assets are
    /// expected to be small.
    pub fn load(&self, url: &str) -> Option<Vec<u8>> {
        let path = self.resolve(url)?;
        match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Asset not available");
                None
            }
        }
    }
}
