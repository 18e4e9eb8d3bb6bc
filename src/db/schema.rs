//! SQL DDL for the durable store.
//!
//! Defines the `memories` table and the `memories_vec` (vec0) virtual table.
//! All DDL uses `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

use crate::embedding::EMBEDDING_DIM;

/// Core memory storage. Tags are a JSON array, metadata a JSON object.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL CHECK(length(trim(owner_id)) > 0),
    title TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    type TEXT NOT NULL DEFAULT 'generic'
        CHECK(type IN ('episodic','semantic','procedural','declarative','implicit','associative','generic')),
    context TEXT,
    metadata TEXT,
    has_embedding INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_memories_owner ON memories(owner_id);
CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(type);
CREATE INDEX IF NOT EXISTS idx_memories_created ON memories(created_at);
"#;

/// vec0 virtual table must be created separately (sqlite-vec syntax).
fn vec_table_sql() -> String {
    format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS memories_vec USING vec0(\n\
         id TEXT PRIMARY KEY,\n\
         embedding FLOAT[{EMBEDDING_DIM}]\n\
         );"
    )
}

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute_batch(&vec_table_sql())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table','index') AND name IN ('memories','memories_vec','idx_memories_owner')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn schema_init_is_idempotent() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn blank_owner_is_rejected_by_check() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO memories (id, owner_id, content, created_at, updated_at) VALUES ('x', '  ', 'c', 't', 't')",
            [],
        );
        assert!(result.is_err());
    }
}
