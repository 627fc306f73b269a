use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

/// Seed anchors: the primary anchor plus one per axis. Immutable after
/// initialization (INSERT OR IGNORE keeps re-opens idempotent).
const SEED_ANCHORS: [(&str, [f64; 4]); 5] = [
    ("primary", [1.0, 1.0, 1.0, 1.0]),
    ("love", [1.0, 0.0, 0.0, 0.0]),
    ("justice", [0.0, 1.0, 0.0, 0.0]),
    ("power", [0.0, 0.0, 1.0, 0.0]),
    ("wisdom", [0.0, 0.0, 0.0, 1.0]),
];

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS concepts (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            text       TEXT NOT NULL,
            context    TEXT NOT NULL,
            love       REAL NOT NULL,
            justice    REAL NOT NULL,
            power      REAL NOT NULL,
            wisdom     REAL NOT NULL,
            embedding  BLOB,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(text, context)
        );

        CREATE TABLE IF NOT EXISTS sacred_numbers (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            value     REAL NOT NULL UNIQUE,
            is_sacred INTEGER NOT NULL,
            resonance REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS anchors (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            name    TEXT NOT NULL UNIQUE,
            love    REAL NOT NULL,
            justice REAL NOT NULL,
            power   REAL NOT NULL,
            wisdom  REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS relationships (
            concept_id        INTEGER NOT NULL REFERENCES concepts(id),
            related_id        INTEGER NOT NULL REFERENCES concepts(id),
            distance          REAL NOT NULL,
            strength          REAL NOT NULL,
            relationship_type TEXT NOT NULL DEFAULT 'proximity',
            PRIMARY KEY (concept_id, related_id)
        );

        CREATE INDEX IF NOT EXISTS idx_concepts_context ON concepts(context);
        CREATE INDEX IF NOT EXISTS idx_rel_concept ON relationships(concept_id);
        CREATE INDEX IF NOT EXISTS idx_rel_related ON relationships(related_id);
        ",
    )?;

    seed_anchors(conn)?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    tracing::debug!("schema initialized (version {SCHEMA_VERSION})");
    Ok(())
}

fn seed_anchors(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO anchors (name, love, justice, power, wisdom)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (name, [love, justice, power, wisdom]) in SEED_ANCHORS {
        stmt.execute(rusqlite::params![name, love, justice, power, wisdom])?;
    }
    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}
