use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::models::LedgerDocument;
use crate::services::analytics_service;
use crate::store::lock::{sibling_with_suffix, LedgerLock};

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Keep the previous file as `<ledger>.bak` on every save.
    pub backup: bool,
    pub lock_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            backup: true,
            lock_timeout: Duration::from_secs(5),
        }
    }
}

/// Flat-file JSON ledger. Every write replaces the whole document.
#[derive(Debug)]
pub struct LedgerStore {
    path: PathBuf,
    options: StoreOptions,
    writer: Mutex<()>,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self {
            path: path.into(),
            options,
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        sibling_with_suffix(&self.path, ".bak")
    }

    /// Reads the ledger. A missing file yields an empty document.
    pub fn load(&self) -> Result<LedgerDocument, AppError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Ledger {} not found, starting from an empty document", self.path.display());
                return Ok(LedgerDocument::default());
            }
            Err(e) => return Err(AppError::Io(e)),
        };
        serde_json::from_str(&raw).map_err(|source| AppError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Stamps `meta.last_updated` and atomically replaces the ledger file.
    pub fn save(&self, doc: &mut LedgerDocument) -> Result<(), AppError> {
        doc.meta.last_updated = Utc::now();

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, &doc)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;

        match fs::metadata(&self.path) {
            Ok(existing) => {
                tmp.as_file().set_permissions(existing.permissions())?;
                if self.options.backup {
                    fs::copy(&self.path, self.backup_path())?;
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(AppError::Io(e)),
        }
        tmp.persist(&self.path).map_err(|e| AppError::Io(e.error))?;
        debug!(
            "Saved ledger {} ({} portfolios)",
            self.path.display(),
            doc.portfolios.len()
        );
        Ok(())
    }

    /// Read-modify-write under the writer lock. Derived figures of every
    /// portfolio are recomputed before `f` runs, so ledgers written without
    /// them stay writable. Nothing is written when `f` or invariant
    /// validation fails.
    pub fn update<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut LedgerDocument) -> Result<T, AppError>,
    {
        let _guard = self.writer.lock();
        let _lock = LedgerLock::acquire(&self.path, self.options.lock_timeout)?;

        let mut doc = self.load()?;
        let repaired = analytics_service::derive_all(&mut doc);
        if !repaired.is_empty() {
            warn!(
                "Recomputed stale derived fields in {} portfolio(s): {}",
                repaired.len(),
                repaired.join(", ")
            );
        }
        let out = f(&mut doc)?;
        doc.validate()?;
        self.save(&mut doc)?;
        Ok(out)
    }

    /// Writes an empty ledger if none exists. Returns true when a file was created.
    pub fn init(&self) -> Result<bool, AppError> {
        let _guard = self.writer.lock();
        let _lock = LedgerLock::acquire(&self.path, self.options.lock_timeout)?;
        if self.path.exists() {
            return Ok(false);
        }
        let mut doc = LedgerDocument::default();
        self.save(&mut doc)?;
        info!("Initialized empty ledger at {}", self.path.display());
        Ok(true)
    }

    /// `load` on the blocking pool, for async callers.
    pub async fn load_async(self: &Arc<Self>) -> Result<LedgerDocument, AppError> {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || store.load())
            .await
            .map_err(|e| AppError::Task(e.to_string()))?
    }

    /// `update` on the blocking pool. Lock waits park a blocking thread
    /// instead of a runtime worker.
    pub async fn update_async<T, F>(self: &Arc<Self>, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut LedgerDocument) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || store.update(f))
            .await
            .map_err(|e| AppError::Task(e.to_string()))?
    }
}
