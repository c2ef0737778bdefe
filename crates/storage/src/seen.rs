use rentwatch_core::{ListingId, Result};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Set of listings that have already been acted upon, backed by an
/// append-only newline-delimited log.
///
/// The in-memory set is authoritative for the life of the process. A failed
/// append is logged and the id is still remembered in memory.
pub struct SeenStore {
    path: PathBuf,
    seen: RwLock<HashSet<ListingId>>,
    /// Serializes appends so each id lands as one whole line.
    writer: Mutex<()>,
}

impl SeenStore {
    /// Load the log at `path`, creating an empty one if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let seen = load(&path)?;
        info!(path = %path.display(), count = seen.len(), "Loaded seen listings");
        Ok(Self {
            path,
            seen: RwLock::new(seen),
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, id: &ListingId) -> bool {
        match self.seen.read() {
            Ok(seen) => seen.contains(id),
            Err(poisoned) => poisoned.into_inner().contains(id),
        }
    }

    pub fn len(&self) -> usize {
        match self.seen.read() {
            Ok(seen) => seen.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all recorded ids, sorted.
    pub fn ids(&self) -> Vec<ListingId> {
        let mut ids: Vec<ListingId> = match self.seen.read() {
            Ok(seen) => seen.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        };
        ids.sort();
        ids
    }

    /// Record `id` as handled. Returns `false` if it was already recorded.
    pub fn record(&self, id: &ListingId) -> bool {
        let _guard = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if self.contains(id) {
            return false;
        }

        if let Err(e) = self.append(id) {
            error!(
                listing = %id,
                path = %self.path.display(),
                error = %e,
                "Failed to persist seen listing, keeping it in memory only"
            );
        }

        let mut seen = match self.seen.write() {
            Ok(seen) => seen,
            Err(poisoned) => poisoned.into_inner(),
        };
        seen.insert(id.clone());
        debug!(listing = %id, "Recorded listing as seen");
        true
    }

    fn append(&self, id: &ListingId) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        // One write per line keeps concurrent appenders from interleaving.
        file.write_all(format!("{}\n", id).as_bytes())?;
        file.sync_data()?;
        Ok(())
    }
}

fn load(path: &Path) -> Result<HashSet<ListingId>> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        File::create(path)?;
        return Ok(HashSet::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut seen = HashSet::new();
    for (n, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        match std::str::from_utf8(&line) {
            Ok(line) => {
                if let Some(id) = ListingId::from_recorded(line) {
                    seen.insert(id);
                }
            }
            Err(e) => warn!(
                path = %path.display(),
                line = n + 1,
                error = %e,
                "Skipping seen log line that is not valid UTF-8"
            ),
        }
    }
    Ok(seen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(s: &str) -> ListingId {
        ListingId::from_recorded(s).unwrap()
    }

    #[test]
    fn test_open_missing_creates_empty_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("seen_listings.txt");

        let store = SeenStore::open(&path).unwrap();
        assert!(store.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn test_record_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seen_listings.txt");

        let store = SeenStore::open(&path).unwrap();
        assert!(store.record(&id("https://x/a")));
        assert!(store.record(&id("https://x/c")));
        assert!(store.record(&id("https://x/b")));
        drop(store);

        let reopened = SeenStore::open(&path).unwrap();
        let ids: HashSet<ListingId> = reopened.ids().into_iter().collect();
        let expected: HashSet<ListingId> = ["https://x/a", "https://x/b", "https://x/c"]
            .iter()
            .map(|s| id(s))
            .collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_record_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seen_listings.txt");

        let store = SeenStore::open(&path).unwrap();
        assert!(store.record(&id("https://x/a")));
        assert!(!store.record(&id("https://x/a")));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "https://x/a\n");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_blank_lines_ignored_and_prior_entries_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seen_listings.txt");
        std::fs::write(&path, "https://x/a\n\n   \nhttps://x/b  \n").unwrap();

        let store = SeenStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.contains(&id("https://x/b")));

        store.record(&id("https://x/c"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("https://x/a\n\n   \nhttps://x/b  \n"));
        assert!(content.ends_with("https://x/c\n"));
    }

    #[test]
    fn test_invalid_utf8_line_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seen_listings.txt");
        let mut content = b"https://x/a\n".to_vec();
        content.extend_from_slice(&[0xff, 0xfe, b'x', b'\n']);
        content.extend_from_slice(b"https://x/b\r\n");
        std::fs::write(&path, content).unwrap();

        let store = SeenStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.contains(&id("https://x/a")));
        assert!(store.contains(&id("https://x/b")));
    }

    #[test]
    fn test_concurrent_records_all_land() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seen_listings.txt");
        let store = std::sync::Arc::new(SeenStore::open(&path).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store.record(&id(&format!("https://x/{}", i + t * 10)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), store.len());
        assert_eq!(SeenStore::open(&path).unwrap().len(), store.len());
    }

    #[test]
    fn test_unpersisted_record_still_remembered() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seen_listings.txt");
        let store = SeenStore::open(&path).unwrap();

        // Replace the log with a directory so appends fail.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(store.record(&id("https://x/a")));
        assert!(store.contains(&id("https://x/a")));
        assert!(!store.record(&id("https://x/a")));
    }
}
