use color_eyre::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Log written by the terminal UI, which cannot log to the screen it draws on
pub const LOG_FILE: &str = "attrition-dash.log";

/// Files `--clear-cache` removes
const CACHE_FILES: &[&str] = &[LOG_FILE];

/// Manages the cache directory (logs)
#[derive(Clone)]
pub struct CacheManager {
    pub(crate) cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(app_name: &str) -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| color_eyre::eyre::eyre!("Could not determine cache directory"))?
            .join(app_name);

        Ok(Self { cache_dir })
    }

    /// Cache rooted somewhere else (primarily for testing)
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn cache_file(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    pub fn log_path(&self) -> PathBuf {
        self.cache_file(LOG_FILE)
    }

    pub fn ensure_cache_dir(&self) -> Result<()> {
        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    /// Remove every known cache file; returns the ones that were deleted
    pub fn clear_all(&self) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for filename in CACHE_FILES {
            let path = self.cache_file(filename);
            if !path.exists() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed.push(path),
                Err(e) => eprintln!("Warning: Could not remove cache file {}: {}", filename, e),
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_all_removes_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::with_dir(dir.path().join("cache"));
        cache.ensure_cache_dir().unwrap();
        fs::write(cache.log_path(), "line\n").unwrap();

        let removed = cache.clear_all().unwrap();
        assert_eq!(removed, vec![cache.log_path()]);
        assert!(!cache.log_path().exists());
        assert!(cache.clear_all().unwrap().is_empty());
    }
}
