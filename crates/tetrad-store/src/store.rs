use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use tetrad_core::{Coordinate, CoordinateEngine, now_iso8601, sacred};

use crate::error::{Result, StoreError};
use crate::schema;

/// A stored concept row. `coordinate` is always the latest computed value;
/// derived metrics are recomputed from it, never stored stale.
#[derive(Clone, Debug)]
pub struct Concept {
    pub id: i64,
    pub text: String,
    pub context: String,
    pub coordinate: Coordinate,
    pub embedding: Option<Vec<f32>>,
    pub created_at: String,
    pub updated_at: String,
}

impl Concept {
    pub fn resonance(&self) -> f64 {
        self.coordinate.resonance()
    }

    pub fn balance(&self) -> f64 {
        self.coordinate.balance()
    }
}

/// A fixed seed point in the 4D space. Created at store initialization,
/// never mutated afterward.
#[derive(Clone, Debug)]
pub struct Anchor {
    pub id: i64,
    pub name: String,
    pub coordinate: Coordinate,
}

#[derive(Clone, Copy, Debug)]
pub struct SacredRecord {
    pub id: i64,
    pub value: f64,
    pub is_sacred: bool,
    pub resonance: f64,
}

#[derive(Clone, Debug, Default)]
pub struct StoreStats {
    pub concepts: usize,
    pub relationships: usize,
    pub sacred_numbers: usize,
    pub anchors: usize,
    pub by_context: Vec<(String, usize)>,
}

/// Durable keyed storage of concepts over a single SQLite connection.
///
/// Single-writer: one handle per process, no internal locking. All writes
/// serialize through the explicit begin/commit boundary; operations issued
/// with no open transaction auto-commit individually.
pub struct ConceptStore {
    conn: Connection,
    engine: CoordinateEngine,
    db_path: Option<PathBuf>,
    txn_active: Cell<bool>,
    savepoints: RefCell<Vec<String>>,
    // id → coordinate acceleration cache; refreshed on write, cleared on
    // rollback and restore, never authoritative.
    cache: RefCell<HashMap<i64, Coordinate>>,
}

impl ConceptStore {
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_engine(path, CoordinateEngine::new())
    }

    pub fn open_with_engine(path: &Path, engine: CoordinateEngine) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn,
            engine,
            db_path: Some(path.to_path_buf()),
            txn_active: Cell::new(false),
            savepoints: RefCell::new(Vec::new()),
            cache: RefCell::new(HashMap::new()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with_engine(CoordinateEngine::new())
    }

    pub fn open_in_memory_with_engine(engine: CoordinateEngine) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn,
            engine,
            db_path: None,
            txn_active: Cell::new(false),
            savepoints: RefCell::new(Vec::new()),
            cache: RefCell::new(HashMap::new()),
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn engine(&self) -> &CoordinateEngine {
        &self.engine
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    // --- Concepts ---

    /// Idempotent upsert keyed by (text, context). Coordinates (and the
    /// embedding, when a model is configured) are recomputed on every call,
    /// overwriting prior values. Returns the stable row id.
    pub fn store(&self, text: &str, context: &str) -> Result<i64> {
        let coordinate = self.engine.calculate_coordinates(text, context);
        let embedding = self.engine.embed(text).map(|e| encode_embedding(&e));
        let now = now_iso8601();

        let id: i64 = self.conn.query_row(
            "INSERT INTO concepts (text, context, love, justice, power, wisdom, embedding, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             ON CONFLICT(text, context) DO UPDATE SET
                 love = excluded.love,
                 justice = excluded.justice,
                 power = excluded.power,
                 wisdom = excluded.wisdom,
                 embedding = excluded.embedding,
                 updated_at = excluded.updated_at
             RETURNING id",
            params![
                text,
                context,
                coordinate.love,
                coordinate.justice,
                coordinate.power,
                coordinate.wisdom,
                embedding,
                now,
            ],
            |row| row.get(0),
        )?;

        self.cache.borrow_mut().insert(id, coordinate);
        tracing::debug!("stored concept {id}: ({text:?}, {context:?})");
        Ok(id)
    }

    pub fn get(&self, text: &str, context: &str) -> Result<Option<Concept>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, text, context, love, justice, power, wisdom, embedding, created_at, updated_at
             FROM concepts WHERE text = ?1 AND context = ?2",
        )?;
        let concept = stmt
            .query_row(params![text, context], row_to_concept)
            .optional()?;
        Ok(concept)
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<Concept>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, text, context, love, justice, power, wisdom, embedding, created_at, updated_at
             FROM concepts WHERE id = ?1",
        )?;
        let concept = stmt.query_row([id], row_to_concept).optional()?;
        Ok(concept)
    }

    /// All concepts in insertion order, optionally restricted to a context.
    pub fn all_concepts(&self, context: Option<&str>) -> Result<Vec<Concept>> {
        let sql_all =
            "SELECT id, text, context, love, justice, power, wisdom, embedding, created_at, updated_at
             FROM concepts ORDER BY id";
        let sql_ctx =
            "SELECT id, text, context, love, justice, power, wisdom, embedding, created_at, updated_at
             FROM concepts WHERE context = ?1 ORDER BY id";

        let concepts = match context {
            Some(ctx) => {
                let mut stmt = self.conn.prepare(sql_ctx)?;
                let rows = stmt.query_map([ctx], row_to_concept)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(sql_all)?;
                let rows = stmt.query_map([], row_to_concept)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(concepts)
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT count(*) FROM concepts", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Store a batch as a single transaction; any failure rolls back the
    /// whole batch. Inside an already-open transaction the batch nests via
    /// an internal savepoint instead of raising.
    pub fn batch_store(&self, items: &[(&str, &str)]) -> Result<Vec<i64>> {
        if self.in_transaction() {
            let name = format!("batch_{}", Uuid::new_v4().simple());
            self.conn.execute_batch(&format!("SAVEPOINT {name}"))?;
            match self.store_all(items) {
                Ok(ids) => {
                    self.conn
                        .execute_batch(&format!("RELEASE SAVEPOINT {name}"))?;
                    Ok(ids)
                }
                Err(e) => {
                    let _ = self.conn.execute_batch(&format!(
                        "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name}"
                    ));
                    self.cache.borrow_mut().clear();
                    Err(e)
                }
            }
        } else {
            self.atomic(|store| store.store_all(items))
        }
    }

    fn store_all(&self, items: &[(&str, &str)]) -> Result<Vec<i64>> {
        items
            .iter()
            .map(|(text, context)| self.store(text, context))
            .collect()
    }

    // --- Transactions ---

    pub fn in_transaction(&self) -> bool {
        self.txn_active.get()
    }

    /// Open an explicit transaction. Only one may be active per handle;
    /// a nested begin is a caller error, not a wait condition.
    pub fn begin(&self) -> Result<()> {
        if self.txn_active.get() {
            return Err(StoreError::TransactionState(
                "transaction already active".to_string(),
            ));
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        self.txn_active.set(true);
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        if !self.txn_active.get() {
            return Err(StoreError::TransactionState(
                "commit with no active transaction".to_string(),
            ));
        }
        self.conn.execute_batch("COMMIT")?;
        self.txn_active.set(false);
        self.savepoints.borrow_mut().clear();
        Ok(())
    }

    pub fn rollback(&self) -> Result<()> {
        if !self.txn_active.get() {
            return Err(StoreError::TransactionState(
                "rollback with no active transaction".to_string(),
            ));
        }
        self.conn.execute_batch("ROLLBACK")?;
        self.txn_active.set(false);
        self.savepoints.borrow_mut().clear();
        // Cached coordinates may describe rows that no longer exist.
        self.cache.borrow_mut().clear();
        Ok(())
    }

    /// Create a named savepoint inside the active transaction.
    pub fn create_savepoint(&self, name: &str) -> Result<()> {
        self.require_transaction("create_savepoint")?;
        validate_savepoint_name(name)?;
        if self.savepoints.borrow().iter().any(|s| s == name) {
            return Err(StoreError::TransactionState(format!(
                "savepoint '{name}' already exists"
            )));
        }
        self.conn.execute_batch(&format!("SAVEPOINT {name}"))?;
        self.savepoints.borrow_mut().push(name.to_string());
        Ok(())
    }

    /// Undo writes made after the savepoint without aborting the outer
    /// transaction. The savepoint itself survives and can be reused.
    pub fn rollback_to_savepoint(&self, name: &str) -> Result<()> {
        self.require_transaction("rollback_to_savepoint")?;
        let position = self.savepoint_position(name)?;
        self.conn
            .execute_batch(&format!("ROLLBACK TO SAVEPOINT {name}"))?;
        self.savepoints.borrow_mut().truncate(position + 1);
        self.cache.borrow_mut().clear();
        Ok(())
    }

    /// Merge the savepoint into its parent scope.
    pub fn release_savepoint(&self, name: &str) -> Result<()> {
        self.require_transaction("release_savepoint")?;
        let position = self.savepoint_position(name)?;
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {name}"))?;
        self.savepoints.borrow_mut().truncate(position);
        Ok(())
    }

    /// Run `f` inside begin/commit; on any error roll back and rethrow.
    pub fn atomic<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.begin()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                let _ = self.rollback();
                Err(e)
            }
        }
    }

    fn require_transaction(&self, operation: &str) -> Result<()> {
        if !self.txn_active.get() {
            return Err(StoreError::TransactionState(format!(
                "{operation} with no active transaction"
            )));
        }
        Ok(())
    }

    fn savepoint_position(&self, name: &str) -> Result<usize> {
        self.savepoints
            .borrow()
            .iter()
            .rposition(|s| s == name)
            .ok_or_else(|| StoreError::TransactionState(format!("no such savepoint: '{name}'")))
    }

    // --- Cache ---

    /// Coordinate for an id, served from the cache when possible. The
    /// database remains authoritative; misses fall through to it.
    pub fn coordinate_of(&self, id: i64) -> Result<Option<Coordinate>> {
        if let Some(coordinate) = self.cache.borrow().get(&id) {
            return Ok(Some(*coordinate));
        }
        let concept = self.get_by_id(id)?;
        if let Some(ref c) = concept {
            self.cache.borrow_mut().insert(id, c.coordinate);
        }
        Ok(concept.map(|c| c.coordinate))
    }

    pub fn cached_len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    // --- Sacred numbers ---

    /// Insert or explicitly overwrite a sacred-number row. Membership and
    /// resonance are derived from the canonical set at write time.
    pub fn store_sacred_number(&self, value: f64) -> Result<i64> {
        let scored = sacred::evaluate(value);
        let id: i64 = self.conn.query_row(
            "INSERT INTO sacred_numbers (value, is_sacred, resonance)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(value) DO UPDATE SET
                 is_sacred = excluded.is_sacred,
                 resonance = excluded.resonance
             RETURNING id",
            params![scored.value, scored.is_sacred as i32, scored.resonance],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn get_sacred_number(&self, value: f64) -> Result<Option<SacredRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, value, is_sacred, resonance FROM sacred_numbers WHERE value = ?1",
        )?;
        let record = stmt
            .query_row([value], |row| {
                Ok(SacredRecord {
                    id: row.get(0)?,
                    value: row.get(1)?,
                    is_sacred: row.get::<_, i32>(2)? != 0,
                    resonance: row.get(3)?,
                })
            })
            .optional()?;
        Ok(record)
    }

    pub fn list_sacred_numbers(&self) -> Result<Vec<SacredRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, value, is_sacred, resonance FROM sacred_numbers ORDER BY value",
        )?;
        let records = stmt
            .query_map([], |row| {
                Ok(SacredRecord {
                    id: row.get(0)?,
                    value: row.get(1)?,
                    is_sacred: row.get::<_, i32>(2)? != 0,
                    resonance: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    // --- Anchors ---

    pub fn anchor(&self, name: &str) -> Result<Option<Anchor>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, love, justice, power, wisdom FROM anchors WHERE name = ?1",
        )?;
        let anchor = stmt.query_row([name], row_to_anchor).optional()?;
        Ok(anchor)
    }

    pub fn anchors(&self) -> Result<Vec<Anchor>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, love, justice, power, wisdom FROM anchors ORDER BY id",
        )?;
        let anchors = stmt
            .query_map([], row_to_anchor)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(anchors)
    }

    // --- Stats ---

    pub fn stats(&self) -> Result<StoreStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        let mut stmt = self
            .conn
            .prepare("SELECT context, count(*) FROM concepts GROUP BY context ORDER BY context")?;
        let by_context = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(StoreStats {
            concepts: count("SELECT count(*) FROM concepts")?,
            relationships: count("SELECT count(*) FROM relationships")?,
            sacred_numbers: count("SELECT count(*) FROM sacred_numbers")?,
            anchors: count("SELECT count(*) FROM anchors")?,
            by_context,
        })
    }
}

fn row_to_concept(row: &rusqlite::Row<'_>) -> std::result::Result<Concept, rusqlite::Error> {
    let embedding: Option<Vec<u8>> = row.get(7)?;
    Ok(Concept {
        id: row.get(0)?,
        text: row.get(1)?,
        context: row.get(2)?,
        coordinate: Coordinate::new(row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?),
        embedding: embedding.map(|blob| decode_embedding(&blob)),
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn row_to_anchor(row: &rusqlite::Row<'_>) -> std::result::Result<Anchor, rusqlite::Error> {
    Ok(Anchor {
        id: row.get(0)?,
        name: row.get(1)?,
        coordinate: Coordinate::new(row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?),
    })
}

/// Pack an embedding as little-endian f32 bytes for BLOB storage.
pub(crate) fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub(crate) fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn validate_savepoint_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidData(format!(
            "invalid savepoint name: '{name}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_get_roundtrip() {
        let store = ConceptStore::open_in_memory().unwrap();
        let id = store.store("love", "biblical").unwrap();

        let concept = store.get("love", "biblical").unwrap().unwrap();
        assert_eq!(concept.id, id);
        assert_eq!(concept.text, "love");
        assert_eq!(concept.context, "biblical");

        // Round-trip law: get returns the just-computed coordinates.
        let expected = store.engine().calculate_coordinates("love", "biblical");
        assert_eq!(concept.coordinate, expected);
    }

    #[test]
    fn test_get_missing_is_none() {
        let store = ConceptStore::open_in_memory().unwrap();
        assert!(store.get("nothing", "general").unwrap().is_none());
        assert!(store.get_by_id(999).unwrap().is_none());
    }

    #[test]
    fn test_upsert_idempotent() {
        let store = ConceptStore::open_in_memory().unwrap();
        let id1 = store.store("mercy", "biblical").unwrap();
        let id2 = store.store("mercy", "biblical").unwrap();

        assert_eq!(id1, id2, "upsert must return a stable id");
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_same_text_different_context_distinct() {
        let store = ConceptStore::open_in_memory().unwrap();
        let a = store.store("love", "biblical").unwrap();
        let b = store.store("love", "general").unwrap();
        assert_ne!(a, b);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_restore_preserves_created_at() {
        let store = ConceptStore::open_in_memory().unwrap();
        store.store("truth", "biblical").unwrap();
        let first = store.get("truth", "biblical").unwrap().unwrap();

        store.store("truth", "biblical").unwrap();
        let second = store.get("truth", "biblical").unwrap().unwrap();
        assert_eq!(first.created_at, second.created_at);
    }

    #[test]
    fn test_batch_store_single_transaction() {
        let store = ConceptStore::open_in_memory().unwrap();
        let ids = store
            .batch_store(&[("love", "biblical"), ("justice", "biblical"), ("love", "general")])
            .unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_batch_store_upserts_duplicates() {
        let store = ConceptStore::open_in_memory().unwrap();
        let ids = store
            .batch_store(&[("love", "biblical"), ("love", "biblical")])
            .unwrap();
        assert_eq!(ids[0], ids[1]);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_begin_rollback_restores_count() {
        let store = ConceptStore::open_in_memory().unwrap();
        store.store("before", "general").unwrap();

        store.begin().unwrap();
        store.store("inside", "general").unwrap();
        assert_eq!(store.count().unwrap(), 2);
        store.rollback().unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert!(store.get("inside", "general").unwrap().is_none());
    }

    #[test]
    fn test_nested_begin_is_error() {
        let store = ConceptStore::open_in_memory().unwrap();
        store.begin().unwrap();
        let err = store.begin().unwrap_err();
        assert!(matches!(err, StoreError::TransactionState(_)));
        store.rollback().unwrap();
    }

    #[test]
    fn test_commit_without_begin_is_error() {
        let store = ConceptStore::open_in_memory().unwrap();
        assert!(matches!(
            store.commit().unwrap_err(),
            StoreError::TransactionState(_)
        ));
        assert!(matches!(
            store.rollback().unwrap_err(),
            StoreError::TransactionState(_)
        ));
    }

    #[test]
    fn test_savepoint_partial_rollback() {
        let store = ConceptStore::open_in_memory().unwrap();

        store.begin().unwrap();
        store.store("alpha", "general").unwrap();
        store.create_savepoint("s1").unwrap();
        store.store("beta", "general").unwrap();
        store.rollback_to_savepoint("s1").unwrap();
        store.commit().unwrap();

        assert!(store.get("alpha", "general").unwrap().is_some());
        assert!(store.get("beta", "general").unwrap().is_none());
    }

    #[test]
    fn test_savepoint_release_merges() {
        let store = ConceptStore::open_in_memory().unwrap();

        store.begin().unwrap();
        store.create_savepoint("s1").unwrap();
        store.store("gamma", "general").unwrap();
        store.release_savepoint("s1").unwrap();
        store.commit().unwrap();

        assert!(store.get("gamma", "general").unwrap().is_some());
    }

    #[test]
    fn test_savepoint_without_transaction_is_error() {
        let store = ConceptStore::open_in_memory().unwrap();
        assert!(matches!(
            store.create_savepoint("s1").unwrap_err(),
            StoreError::TransactionState(_)
        ));
        assert!(matches!(
            store.rollback_to_savepoint("s1").unwrap_err(),
            StoreError::TransactionState(_)
        ));
        assert!(matches!(
            store.release_savepoint("s1").unwrap_err(),
            StoreError::TransactionState(_)
        ));
    }

    #[test]
    fn test_unknown_savepoint_is_error() {
        let store = ConceptStore::open_in_memory().unwrap();
        store.begin().unwrap();
        assert!(matches!(
            store.rollback_to_savepoint("ghost").unwrap_err(),
            StoreError::TransactionState(_)
        ));
        store.rollback().unwrap();
    }

    #[test]
    fn test_duplicate_savepoint_name_is_error() {
        let store = ConceptStore::open_in_memory().unwrap();
        store.begin().unwrap();
        store.create_savepoint("s1").unwrap();
        assert!(matches!(
            store.create_savepoint("s1").unwrap_err(),
            StoreError::TransactionState(_)
        ));
        store.rollback().unwrap();
    }

    #[test]
    fn test_invalid_savepoint_name() {
        let store = ConceptStore::open_in_memory().unwrap();
        store.begin().unwrap();
        assert!(matches!(
            store.create_savepoint("s1; DROP TABLE concepts").unwrap_err(),
            StoreError::InvalidData(_)
        ));
        store.rollback().unwrap();
    }

    #[test]
    fn test_savepoint_reusable_after_rollback_to() {
        let store = ConceptStore::open_in_memory().unwrap();
        store.begin().unwrap();
        store.create_savepoint("s1").unwrap();
        store.store("one", "general").unwrap();
        store.rollback_to_savepoint("s1").unwrap();
        // The savepoint survives a rollback-to; a second rollback-to works.
        store.store("two", "general").unwrap();
        store.rollback_to_savepoint("s1").unwrap();
        store.commit().unwrap();

        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_atomic_commits_on_ok() {
        let store = ConceptStore::open_in_memory().unwrap();
        let id = store
            .atomic(|s| {
                s.store("alpha", "general")?;
                s.store("beta", "general")
            })
            .unwrap();
        assert!(id > 0);
        assert_eq!(store.count().unwrap(), 2);
        assert!(!store.in_transaction());
    }

    #[test]
    fn test_atomic_rolls_back_on_error() {
        let store = ConceptStore::open_in_memory().unwrap();
        let result: Result<()> = store.atomic(|s| {
            s.store("doomed", "general")?;
            Err(StoreError::InvalidData("forced failure".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(store.count().unwrap(), 0);
        assert!(!store.in_transaction());
    }

    #[test]
    fn test_batch_store_nests_in_open_transaction() {
        let store = ConceptStore::open_in_memory().unwrap();
        store.begin().unwrap();
        store
            .batch_store(&[("one", "general"), ("two", "general")])
            .unwrap();
        store.rollback().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_cache_refreshed_on_write() {
        let store = ConceptStore::open_in_memory().unwrap();
        let id = store.store("love", "biblical").unwrap();
        assert_eq!(store.cached_len(), 1);

        let cached = store.coordinate_of(id).unwrap().unwrap();
        let expected = store.engine().calculate_coordinates("love", "biblical");
        assert_eq!(cached, expected);
    }

    #[test]
    fn test_cache_cleared_on_rollback() {
        let store = ConceptStore::open_in_memory().unwrap();
        store.begin().unwrap();
        store.store("ghost", "general").unwrap();
        assert!(store.cached_len() > 0);
        store.rollback().unwrap();
        assert_eq!(store.cached_len(), 0);
    }

    #[test]
    fn test_cache_not_authoritative() {
        let store = ConceptStore::open_in_memory().unwrap();
        let id = store.store("love", "biblical").unwrap();
        store.clear_cache();
        assert_eq!(store.cached_len(), 0);

        // Miss falls through to the database and repopulates.
        let coordinate = store.coordinate_of(id).unwrap().unwrap();
        let expected = store.engine().calculate_coordinates("love", "biblical");
        assert_eq!(coordinate, expected);
        assert_eq!(store.cached_len(), 1);
    }

    #[test]
    fn test_sacred_number_roundtrip() {
        let store = ConceptStore::open_in_memory().unwrap();
        store.store_sacred_number(7.0).unwrap();
        let record = store.get_sacred_number(7.0).unwrap().unwrap();
        assert!(record.is_sacred);
        assert!((record.resonance - 1.0).abs() < 1e-10);

        store.store_sacred_number(8.0).unwrap();
        let near = store.get_sacred_number(8.0).unwrap().unwrap();
        assert!(!near.is_sacred);
        assert!(near.resonance < 1.0);
    }

    #[test]
    fn test_sacred_number_overwrite() {
        let store = ConceptStore::open_in_memory().unwrap();
        let id1 = store.store_sacred_number(12.0).unwrap();
        let id2 = store.store_sacred_number(12.0).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(store.list_sacred_numbers().unwrap().len(), 1);
    }

    #[test]
    fn test_anchors_seeded_and_readable() {
        let store = ConceptStore::open_in_memory().unwrap();
        let primary = store.anchor("primary").unwrap().unwrap();
        assert_eq!(primary.coordinate, Coordinate::primary_anchor());

        let all = store.anchors().unwrap();
        assert_eq!(all.len(), 5);
        assert!(store.anchor("nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_embedding_encode_decode() {
        let original = vec![0.1f32, -2.5, 1000.0, 0.0];
        let decoded = decode_embedding(&encode_embedding(&original));
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_stats() {
        let store = ConceptStore::open_in_memory().unwrap();
        store.store("love", "biblical").unwrap();
        store.store("justice", "biblical").unwrap();
        store.store("law", "governance").unwrap();
        store.store_sacred_number(7.0).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.concepts, 3);
        assert_eq!(stats.sacred_numbers, 1);
        assert_eq!(stats.anchors, 5);
        assert_eq!(
            stats.by_context,
            vec![("biblical".to_string(), 2), ("governance".to_string(), 1)]
        );
    }
}
