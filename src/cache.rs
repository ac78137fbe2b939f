use color_eyre::Result;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const QUERY_HISTORY_FILE: &str = "query_history.txt";
pub const LOG_FILE: &str = "tfsview.log";

/// Registry of known cache files
const CACHE_FILES: &[&str] = &[QUERY_HISTORY_FILE, LOG_FILE];

/// Manages cache directory and cache file operations
#[derive(Clone)]
pub struct CacheManager {
    pub(crate) cache_dir: PathBuf,
}

impl CacheManager {
    /// Create a new CacheManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| color_eyre::eyre::eyre!("Could not determine cache directory"))?
            .join(app_name);

        Ok(Self { cache_dir })
    }

    /// Cache rooted at `cache_dir` (tests)
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn cache_file(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    pub fn ensure_cache_dir(&self) -> Result<()> {
        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    /// Clear all registered cache files
    pub fn clear_all(&self) -> Result<()> {
        for filename in CACHE_FILES {
            let file_path = self.cache_file(filename);
            if file_path.exists() {
                if let Err(e) = fs::remove_file(&file_path) {
                    eprintln!("Warning: Could not remove cache file {}: {}", filename, e);
                }
            }
        }

        Ok(())
    }
}

/// Successful queries, oldest first, persisted one per line.
#[derive(Debug, Clone)]
pub struct QueryHistory {
    entries: Vec<String>,
    limit: usize,
    path: Option<PathBuf>,
}

impl QueryHistory {
    /// History that is never written to disk.
    pub fn in_memory(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit,
            path: None,
        }
    }

    /// Read the history file in the cache directory; a missing file is an empty history.
    pub fn load(cache: &CacheManager, limit: usize) -> Self {
        let path = cache.cache_file(QUERY_HISTORY_FILE);
        let mut entries: Vec<String> = match fs::read_to_string(&path) {
            Ok(content) => content
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("could not read query history: {}", e);
                Vec::new()
            }
        };
        if entries.len() > limit {
            entries.drain(..entries.len() - limit);
        }
        Self {
            entries,
            limit,
            path: Some(path),
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.entries.get(idx).map(String::as_str)
    }

    /// Append a query unless it repeats the last one, then save.
    pub fn push(&mut self, query: &str) {
        let query = query.trim();
        if query.is_empty() || query.contains('\n') || self.limit == 0 {
            return;
        }
        if self.entries.last().map(String::as_str) == Some(query) {
            return;
        }
        self.entries.push(query.to_string());
        if self.entries.len() > self.limit {
            self.entries.remove(0);
        }
        self.save();
    }

    fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("could not create cache directory: {}", e);
                return;
            }
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path);
        match file {
            Ok(mut file) => {
                if let Err(e) = fs2::FileExt::try_lock_exclusive(&file) {
                    warn!("could not lock history file: {}", e);
                    return;
                }
                for query in &self.entries {
                    if let Err(e) = writeln!(file, "{}", query) {
                        warn!("could not write query to history: {}", e);
                        return;
                    }
                }
                if let Err(e) = file.flush() {
                    warn!("could not flush history file: {}", e);
                }
            }
            Err(e) => warn!("could not create history file: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn history_round_trips_through_cache_dir() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::with_dir(dir.path().to_path_buf());
        let mut history = QueryHistory::load(&cache, 10);
        history.push("A > 2");
        history.push("A > 2");
        history.push("  B < 1 ");
        let reloaded = QueryHistory::load(&cache, 10);
        assert_eq!(reloaded.entries(), ["A > 2", "B < 1"]);
    }

    #[test]
    fn history_is_capped() {
        let mut history = QueryHistory::in_memory(2);
        for q in ["a > 1", "a > 2", "a > 3"] {
            history.push(q);
        }
        assert_eq!(history.entries(), ["a > 2", "a > 3"]);
    }

    #[test]
    fn clear_all_removes_history() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::with_dir(dir.path().to_path_buf());
        QueryHistory::load(&cache, 10).push("x == 1");
        assert!(cache.cache_file(QUERY_HISTORY_FILE).exists());
        cache.clear_all().unwrap();
        assert!(!cache.cache_file(QUERY_HISTORY_FILE).exists());
    }
}
