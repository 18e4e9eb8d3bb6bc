//! Aggregate statistics over one owner's records.

use anyhow::Result;
use chrono::{Duration, Utc};
use rusqlite::{params, Connection};
use std::collections::HashMap;

use crate::memory::types::{MemoryStats, MemoryType};

/// Compute memory statistics for `owner`.
///
/// `recently_added` counts records created within the trailing 24 hours from
/// call time — a wall-clock window, not a calendar boundary, inclusive at
/// exactly now − 24 h. Timestamps are uniform RFC 3339 UTC strings, so the
/// lexicographic SQL comparison is chronological.
pub fn memory_stats(conn: &Connection, owner: &str) -> Result<MemoryStats> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM memories WHERE owner_id = ?1",
        params![owner],
        |row| row.get(0),
    )?;

    let by_type = count_by_type(conn, owner)?;
    let by_tag = count_by_tag(conn, owner)?;

    let cutoff = (Utc::now() - Duration::hours(24)).to_rfc3339();
    let recently_added: i64 = conn.query_row(
        "SELECT COUNT(*) FROM memories WHERE owner_id = ?1 AND created_at >= ?2",
        params![owner, cutoff],
        |row| row.get(0),
    )?;

    Ok(MemoryStats {
        total: total as u64,
        by_type,
        by_tag,
        recently_added: recently_added as u64,
    })
}

/// Count by memory type, zero-filled so every kind is present. The values
/// partition the total exactly: each record has exactly one type.
fn count_by_type(conn: &Connection, owner: &str) -> Result<HashMap<String, u64>> {
    let mut map = HashMap::new();
    for t in MemoryType::all() {
        map.insert(t.as_str().to_string(), 0);
    }

    let mut stmt =
        conn.prepare("SELECT type, COUNT(*) FROM memories WHERE owner_id = ?1 GROUP BY type")?;
    let rows: Vec<(String, i64)> = stmt
        .query_map(params![owner], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    for (t, count) in rows {
        map.insert(t, count as u64);
    }
    Ok(map)
}

/// Count by tag. Tags live in a JSON array column, so the aggregation
/// happens here rather than in SQL.
fn count_by_tag(conn: &Connection, owner: &str) -> Result<HashMap<String, u64>> {
    let mut stmt = conn.prepare("SELECT tags FROM memories WHERE owner_id = ?1")?;
    let rows: Vec<String> = stmt
        .query_map(params![owner], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut map: HashMap<String, u64> = HashMap::new();
    for tags_json in rows {
        let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
        for tag in tags {
            *map.entry(tag).or_insert(0) += 1;
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::memory::store::insert_record;
    use crate::memory::types::NewMemory;

    fn test_db() -> Connection {
        db::open_memory_database().unwrap()
    }

    fn insert(conn: &mut Connection, owner: &str, memory_type: MemoryType, tags: &[&str]) {
        let memory = NewMemory {
            title: "t".into(),
            content: "c".into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            memory_type,
            ..Default::default()
        };
        insert_record(conn, owner, &memory, None).unwrap();
    }

    /// Insert a row with a crafted created_at, bypassing the write path.
    fn insert_at(conn: &Connection, owner: &str, created_at: &str) {
        conn.execute(
            "INSERT INTO memories (id, owner_id, content, created_at, updated_at) VALUES (?1, ?2, 'c', ?3, ?3)",
            params![uuid::Uuid::now_v7().to_string(), owner, created_at],
        )
        .unwrap();
    }

    #[test]
    fn empty_owner_stats_are_zero() {
        let conn = test_db();
        let stats = memory_stats(&conn, "u1").unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.recently_added, 0);
        assert!(stats.by_tag.is_empty());
        assert_eq!(stats.by_type.len(), 7);
        assert!(stats.by_type.values().all(|v| *v == 0));
    }

    #[test]
    fn by_type_partitions_the_total() {
        let mut conn = test_db();
        insert(&mut conn, "u1", MemoryType::Semantic, &[]);
        insert(&mut conn, "u1", MemoryType::Semantic, &[]);
        insert(&mut conn, "u1", MemoryType::Episodic, &[]);
        insert(&mut conn, "u1", MemoryType::Generic, &[]);

        let stats = memory_stats(&conn, "u1").unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_type["semantic"], 2);
        assert_eq!(stats.by_type["episodic"], 1);
        assert_eq!(stats.by_type["generic"], 1);
        assert_eq!(stats.by_type.values().sum::<u64>(), stats.total);
    }

    #[test]
    fn by_tag_counts_across_records() {
        let mut conn = test_db();
        insert(&mut conn, "u1", MemoryType::Generic, &["rust", "work"]);
        insert(&mut conn, "u1", MemoryType::Generic, &["rust"]);
        insert(&mut conn, "u2", MemoryType::Generic, &["rust"]);

        let stats = memory_stats(&conn, "u1").unwrap();
        assert_eq!(stats.by_tag["rust"], 2);
        assert_eq!(stats.by_tag["work"], 1);
        assert!(!stats.by_tag.contains_key("other"));
    }

    #[test]
    fn stats_are_owner_scoped() {
        let mut conn = test_db();
        insert(&mut conn, "u1", MemoryType::Generic, &[]);
        insert(&mut conn, "u2", MemoryType::Generic, &[]);

        assert_eq!(memory_stats(&conn, "u1").unwrap().total, 1);
        assert_eq!(memory_stats(&conn, "u2").unwrap().total, 1);
    }

    #[test]
    fn recently_added_window_edges() {
        let conn = test_db();
        let now = Utc::now();

        // Just inside the trailing 24h window
        insert_at(&conn, "u1", &(now - Duration::hours(23)).to_rfc3339());
        // Just outside
        insert_at(&conn, "u1", &(now - Duration::hours(25)).to_rfc3339());
        // Well outside
        insert_at(&conn, "u1", &(now - Duration::days(30)).to_rfc3339());

        let stats = memory_stats(&conn, "u1").unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.recently_added, 1);
    }

    #[test]
    fn recently_added_counts_fresh_records() {
        let mut conn = test_db();
        insert(&mut conn, "u1", MemoryType::Generic, &[]);
        let stats = memory_stats(&conn, "u1").unwrap();
        assert_eq!(stats.recently_added, 1);
    }
}
