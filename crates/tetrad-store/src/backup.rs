use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::backup::Backup;
use rusqlite::{Connection, OpenFlags};

use tetrad_core::{now_unix_secs, timestamp_slug};

use crate::error::{Result, StoreError};
use crate::interchange::{self, Interchange};
use crate::store::ConceptStore;

const BACKUP_PREFIX: &str = "tetrad-";
const BACKUP_SUFFIX: &str = ".db";

/// Snapshot/restore, interchange export, and rotation over a ConceptStore's
/// durable state. Operates independently of the query path; refuses to run
/// while a write transaction is open on the same handle.
pub struct BackupManager<'a> {
    store: &'a ConceptStore,
}

impl<'a> BackupManager<'a> {
    pub fn new(store: &'a ConceptStore) -> Self {
        Self { store }
    }

    /// Copy the store's entire current state to a new file using SQLite's
    /// online backup API — consistent, non-blocking for concurrent readers.
    /// With no explicit path, writes next to the database file.
    pub fn create_backup(&self, path: Option<&Path>) -> Result<PathBuf> {
        self.require_no_transaction("create_backup")?;

        let path = match path {
            Some(p) => p.to_path_buf(),
            None => self.default_backup_path()?,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("create {}: {e}", parent.display())))?;
        }

        let mut dst = Connection::open(&path)?;
        let backup = Backup::new(self.store.conn(), &mut dst)?;
        backup.run_to_completion(64, Duration::from_millis(10), None)?;

        tracing::info!("backup written to {}", path.display());
        Ok(path)
    }

    /// Structurally sanity-check a backup file. Never throws: any failure
    /// (missing file, corruption, wrong schema) is just `false`.
    pub fn verify_backup(&self, path: &Path) -> bool {
        verify_file(path).unwrap_or(false)
    }

    /// Replace the live store's contents from a backup file, inside one
    /// transaction: a partway failure rolls back and leaves the original
    /// state untouched.
    pub fn restore_from_backup(&self, path: &Path) -> Result<()> {
        self.require_no_transaction("restore_from_backup")?;
        if !self.verify_backup(path) {
            return Err(StoreError::InvalidData(format!(
                "not a valid backup file: {}",
                path.display()
            )));
        }

        let conn = self.store.conn();
        conn.execute(
            "ATTACH DATABASE ?1 AS restore_src",
            [path.to_string_lossy().as_ref()],
        )?;

        let result = self.store.atomic(|store| {
            store.conn().execute_batch(
                "DELETE FROM relationships;
                 DELETE FROM concepts;
                 DELETE FROM sacred_numbers;
                 DELETE FROM anchors;

                 INSERT INTO concepts
                     (id, text, context, love, justice, power, wisdom, embedding, created_at, updated_at)
                 SELECT id, text, context, love, justice, power, wisdom, embedding, created_at, updated_at
                 FROM restore_src.concepts;

                 INSERT INTO sacred_numbers (id, value, is_sacred, resonance)
                 SELECT id, value, is_sacred, resonance FROM restore_src.sacred_numbers;

                 INSERT INTO anchors (id, name, love, justice, power, wisdom)
                 SELECT id, name, love, justice, power, wisdom FROM restore_src.anchors;

                 INSERT INTO relationships
                     (concept_id, related_id, distance, strength, relationship_type)
                 SELECT concept_id, related_id, distance, strength, relationship_type
                 FROM restore_src.relationships;",
            )?;
            Ok(())
        });

        let _ = conn.execute_batch("DETACH DATABASE restore_src");
        result?;

        self.store.clear_cache();
        tracing::info!("restored from {}", path.display());
        Ok(())
    }

    /// Serialize every logical table to one JSON document.
    pub fn export_to_json(&self) -> Result<String> {
        let doc = interchange::export(self.store)?;
        serde_json::to_string_pretty(&doc)
            .map_err(|e| StoreError::InvalidData(format!("JSON export failed: {e}")))
    }

    pub fn export_to_json_file(&self, path: &Path) -> Result<()> {
        let json = self.export_to_json()?;
        fs::write(path, json)
            .map_err(|e| StoreError::Io(format!("write {}: {e}", path.display())))
    }

    /// Replace the store's contents from an interchange document.
    pub fn restore_from_json(&self, json: &str) -> Result<()> {
        let doc: Interchange = serde_json::from_str(json)
            .map_err(|e| StoreError::InvalidData(format!("invalid interchange JSON: {e}")))?;
        interchange::apply(self.store, &doc)
    }

    pub fn restore_from_json_file(&self, path: &Path) -> Result<()> {
        let json = fs::read_to_string(path)
            .map_err(|e| StoreError::Io(format!("read {}: {e}", path.display())))?;
        self.restore_from_json(&json)
    }

    /// Create a timestamped backup in `dir`, then delete the oldest backups
    /// beyond `keep_last_n` by timestamp ordering.
    pub fn auto_backup(&self, dir: &Path, keep_last_n: usize) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .map_err(|e| StoreError::Io(format!("create {}: {e}", dir.display())))?;

        let slug = timestamp_slug(now_unix_secs());
        let mut path = dir.join(format!("{BACKUP_PREFIX}{slug}{BACKUP_SUFFIX}"));
        // Same-second collision: disambiguate rather than overwrite.
        let mut n = 1;
        while path.exists() {
            path = dir.join(format!("{BACKUP_PREFIX}{slug}_{n}{BACKUP_SUFFIX}"));
            n += 1;
        }

        let written = self.create_backup(Some(&path))?;
        self.prune_backups(dir, keep_last_n)?;
        Ok(written)
    }

    fn prune_backups(&self, dir: &Path, keep_last_n: usize) -> Result<()> {
        let entries = fs::read_dir(dir)
            .map_err(|e| StoreError::Io(format!("read {}: {e}", dir.display())))?;

        let mut backups: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with(BACKUP_PREFIX) || !name.ends_with(BACKUP_SUFFIX) {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::UNIX_EPOCH);
            backups.push((modified, path));
        }

        // Oldest first: modification time, filename as tiebreak.
        backups.sort();
        while backups.len() > keep_last_n {
            let (_, oldest) = backups.remove(0);
            fs::remove_file(&oldest)
                .map_err(|e| StoreError::Io(format!("remove {}: {e}", oldest.display())))?;
            tracing::info!("pruned old backup {}", oldest.display());
        }
        Ok(())
    }

    fn default_backup_path(&self) -> Result<PathBuf> {
        let db_path = self.store.db_path().ok_or_else(|| {
            StoreError::InvalidData(
                "backup path required for an in-memory store".to_string(),
            )
        })?;
        let dir = db_path.parent().unwrap_or_else(|| Path::new("."));
        let slug = timestamp_slug(now_unix_secs());
        Ok(dir.join(format!("{BACKUP_PREFIX}{slug}{BACKUP_SUFFIX}")))
    }

    fn require_no_transaction(&self, operation: &str) -> Result<()> {
        if self.store.in_transaction() {
            return Err(StoreError::TransactionState(format!(
                "{operation} while a transaction is open"
            )));
        }
        Ok(())
    }
}

fn verify_file(path: &Path) -> Result<bool> {
    if !path.is_file() {
        return Ok(false);
    }
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

    let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    if integrity != "ok" {
        return Ok(false);
    }

    for table in ["concepts", "sacred_numbers", "anchors", "relationships", "metadata"] {
        let present: i64 = conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        if present == 0 {
            return Ok(false);
        }
    }
    Ok(true)
}
