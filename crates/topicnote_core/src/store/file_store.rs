//! File-backed document store.
//!
//! # Responsibility
//! - Load and persist the JSON document at one filesystem path.
//! - Serialize transactions on that path across every handle in the process.
//! - Replace the target file atomically on every write.
//!
//! # Invariants
//! - Missing or blank files load as an empty document.
//! - Writes go to a temp file in the target directory and are renamed over
//!   the target; a failed or interrupted write leaves the previous version.
//! - The path lock is held for the full load -> mutate -> persist cycle.

use super::{DocumentStore, StoreError, StoreResult, TxOutcome};
use crate::model::document::{Document, DOCUMENT_FORMAT_VERSION};
use log::{debug, error, info};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::NamedTempFile;

// One entry per distinct store file ever opened in the process; entries are
// never evicted so every handle for a path keeps seeing the same lock.
static PATH_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// JSON document store rooted at a single file.
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl FileDocumentStore {
    /// Creates a handle for `path` without touching the filesystem beyond
    /// resolving the absolute path.
    ///
    /// Handles created for the same file share one lock.
    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = absolute_path(path.as_ref())?;
        let lock = Arc::clone(
            PATH_LOCKS
                .lock()
                .entry(path.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        );
        Ok(Self { path, lock })
    }

    /// Creates a handle and initializes storage: parent directories are created
    /// and an empty document is written when the file does not exist yet.
    ///
    /// # Side effects
    /// - Emits `store_open` logging events.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let requested = path.as_ref();
        if let Some(parent) = requested.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| StoreError::io(parent, err))?;
        }

        let store = Self::new(requested)?;
        let guard = store.lock.lock();
        if !store.path.exists() {
            store.persist(&Document::empty())?;
            info!(
                "event=store_open module=store status=ok created=true path={}",
                store.path.display()
            );
        } else {
            // Surface corruption at start-up rather than on the first request.
            store.load()?;
            info!(
                "event=store_open module=store status=ok created=false path={}",
                store.path.display()
            );
        }
        drop(guard);
        Ok(store)
    }

    /// Absolute path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StoreResult<Document> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Document::empty()),
            Err(err) => return Err(StoreError::io(&self.path, err)),
        };
        if raw.trim().is_empty() {
            return Ok(Document::empty());
        }

        let doc: Document =
            serde_json::from_str(&raw).map_err(|err| StoreError::corrupt(&self.path, err))?;
        if doc.version > DOCUMENT_FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: doc.version,
                supported: DOCUMENT_FORMAT_VERSION,
            });
        }
        doc.validate()
            .map_err(|err| StoreError::corrupt(&self.path, err))?;
        Ok(doc)
    }

    fn persist(&self, doc: &Document) -> StoreResult<()> {
        doc.validate()?;
        self.stage(doc)?.commit()
    }

    /// Writes `doc` to a synced temp file next to the target without replacing it.
    fn stage(&self, doc: &Document) -> StoreResult<StagedDocument<'_>> {
        let dir = self.parent_dir();
        let mut temp = NamedTempFile::new_in(dir).map_err(|err| StoreError::io(dir, err))?;
        let temp_path = temp.path().to_path_buf();
        serde_json::to_writer_pretty(temp.as_file_mut(), doc)?;
        let file = temp.as_file_mut();
        file.write_all(b"\n")
            .and_then(|()| file.flush())
            .and_then(|()| file.sync_all())
            .map_err(|err| StoreError::io(temp_path, err))?;
        Ok(StagedDocument {
            temp,
            target: &self.path,
        })
    }

    fn parent_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

impl DocumentStore for FileDocumentStore {
    fn transact<R, F>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut Document) -> TxOutcome<R>,
    {
        let started_at = Instant::now();
        let _guard = self.lock.lock();

        let mut doc = self.load().map_err(|err| {
            error!(
                "event=store_tx module=store status=error stage=load error_code={} error={}",
                err.code(),
                err
            );
            err
        })?;

        let outcome = f(&mut doc);
        let changed = outcome.is_changed();
        if changed {
            self.persist(&doc).map_err(|err| {
                error!(
                    "event=store_tx module=store status=error stage=persist error_code={} error={}",
                    err.code(),
                    err
                );
                err
            })?;
        }

        debug!(
            "event=store_tx module=store status=ok changed={} topics={} duration_ms={}",
            changed,
            doc.topics.len(),
            started_at.elapsed().as_millis()
        );
        Ok(outcome.into_value())
    }
}

/// Fully written temp file awaiting the atomic rename over its target.
///
/// Dropping it without `commit` deletes the temp file and leaves the target
/// untouched.
struct StagedDocument<'a> {
    temp: NamedTempFile,
    target: &'a Path,
}

impl StagedDocument<'_> {
    fn commit(self) -> StoreResult<()> {
        let target = self.target;
        self.temp
            .persist(target)
            .map_err(|err| StoreError::io(target, err.error))?;
        sync_dir(target);
        Ok(())
    }
}

// Flush the directory entry after rename where the platform allows it.
fn sync_dir(target: &Path) {
    if let Some(dir) = target.parent() {
        if let Ok(handle) = File::open(dir) {
            let _ = handle.sync_all();
        }
    }
}

fn absolute_path(path: &Path) -> StoreResult<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|err| StoreError::io(path, err))?
            .join(path)
    };

    // Canonicalize the deepest existing directory and re-append the rest, so
    // the lock key is the same before and after `open` creates the parents.
    let (Some(mut base), Some(name)) = (absolute.parent(), absolute.file_name()) else {
        return Ok(absolute);
    };
    let mut missing = vec![name.to_os_string()];
    loop {
        if let Ok(resolved) = base.canonicalize() {
            return Ok(missing
                .iter()
                .rev()
                .fold(resolved, |acc, part| acc.join(part)));
        }
        match (base.parent(), base.file_name()) {
            (Some(parent), Some(part)) => {
                missing.push(part.to_os_string());
                base = parent;
            }
            _ => return Ok(absolute),
        }
    }
}
