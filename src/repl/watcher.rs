use crossbeam_channel::Sender;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Watches definition files and forwards notify events to a channel.
///
/// The parent directory is watched rather than the file itself: editors
/// that save by writing a new file and renaming it over the old one would
/// otherwise end the watch after the first save.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    dirs: HashSet<PathBuf>,
    files: HashSet<PathBuf>,
}

impl FileWatcher {
    /// Create a new file watcher that sends events to the provided channel
    pub fn new(tx: Sender<notify::Result<Event>>) -> notify::Result<Self> {
        let watcher = notify::recommended_watcher(move |res| {
            // The receiver is gone only when the REPL is shutting down
            let _ = tx.send(res);
        })?;

        Ok(Self {
            watcher,
            dirs: HashSet::new(),
            files: HashSet::new(),
        })
    }

    /// Start watching `path`. Returns false if it was already watched.
    pub fn watch_file(&mut self, path: &Path) -> notify::Result<bool> {
        let file = canonical(path);
        if self.files.contains(&file) {
            return Ok(false);
        }
        let dir = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        if !self.dirs.contains(&dir) {
            self.watcher.watch(&dir, RecursiveMode::NonRecursive)?;
            self.dirs.insert(dir);
        }
        self.files.insert(file);
        Ok(true)
    }

    /// Is `path` one of the watched files (rather than a sibling in a
    /// watched directory)?
    pub fn is_watched(&self, path: &Path) -> bool {
        self.files.contains(&canonical(path))
    }
}

pub fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_watch_file_tracks_siblings_separately() {
        let dir = std::env::temp_dir().join(format!("sparks-watch-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("counter.json");
        let sibling = dir.join("other.json");
        std::fs::write(&file, "{}").unwrap();
        std::fs::write(&sibling, "{}").unwrap();

        let (tx, _rx) = unbounded();
        let mut watcher = FileWatcher::new(tx).unwrap();
        assert!(watcher.watch_file(&file).unwrap());
        assert!(!watcher.watch_file(&file).unwrap());

        assert!(watcher.is_watched(&file));
        assert!(!watcher.is_watched(&sibling));
    }
}
