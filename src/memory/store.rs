//! Durable store — record persistence and the server-side search paths.
//!
//! [`insert_record`] runs the write path inside a transaction: memories row
//! plus the embedding vector when one was produced. The query half provides
//! ranked KNN search over `memories_vec` (candidate over-fetch, then
//! owner/type/threshold post-filter) and the plain substring fallback used
//! when no embedding capability exists.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

use crate::memory::types::{
    MemoryRecord, MemoryType, NewMemory, SimilarityResult, SUBSTRING_SENTINEL_SCORE,
};

/// Max characters of content mirrored into the local fallback index.
pub const SNIPPET_MAX_CHARS: usize = 240;

/// A record's embedding joined with enough context to rebuild the local index.
#[derive(Debug, Clone)]
pub struct EmbeddedEntry {
    pub id: String,
    pub owner_id: String,
    pub snippet: String,
    pub embedding: Vec<f32>,
}

/// Write path: memories row + optional embedding vector, one transaction.
///
/// The caller has already validated owner and content; the embedding is
/// `None` when the generator was unavailable, in which case the record is
/// reachable only via substring search.
pub fn insert_record(
    conn: &mut Connection,
    owner: &str,
    memory: &NewMemory,
    embedding: Option<&[f32]>,
) -> Result<MemoryRecord> {
    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let tags = dedup_tags(&memory.tags);
    let tags_json = serde_json::to_string(&tags)?;
    let metadata_json = memory
        .metadata
        .as_ref()
        .map(|m| serde_json::to_string(m))
        .transpose()?;

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO memories (id, owner_id, title, content, tags, type, context, metadata, has_embedding, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            id,
            owner,
            memory.title,
            memory.content,
            tags_json,
            memory.memory_type.as_str(),
            memory.context,
            metadata_json,
            embedding.is_some(),
            now,
        ],
    )?;

    if let Some(embedding) = embedding {
        tx.execute(
            "INSERT INTO memories_vec (id, embedding) VALUES (?1, ?2)",
            params![id, embedding_to_bytes(embedding)],
        )?;
    }
    tx.commit()?;

    Ok(MemoryRecord {
        id,
        owner_id: owner.to_string(),
        title: memory.title.clone(),
        content: memory.content.clone(),
        tags,
        memory_type: memory.memory_type,
        context: memory.context.clone(),
        metadata: memory.metadata.clone(),
        has_embedding: embedding.is_some(),
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Ranked similarity search: KNN over `memories_vec`, then hydrate and
/// post-filter by owner, type, and threshold.
///
/// `candidate_limit` bounds the KNN over-fetch that compensates for
/// post-filtering; results are descending by similarity, at most `limit`.
pub fn query_ranked_by_embedding(
    conn: &Connection,
    owner: &str,
    embedding: &[f32],
    threshold: f32,
    limit: usize,
    type_filter: Option<MemoryType>,
    candidate_limit: usize,
) -> Result<Vec<SimilarityResult>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let max_distance = cosine_threshold_to_l2(threshold);

    let mut stmt = conn.prepare(
        "SELECT id, distance FROM memories_vec \
         WHERE embedding MATCH ?1 ORDER BY distance LIMIT ?2",
    )?;
    let candidates: Vec<(String, f64)> = stmt
        .query_map(
            params![embedding_to_bytes(embedding), candidate_limit.max(limit) as i64],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
        )?
        .collect::<Result<Vec<_>, _>>()?;

    let mut results = Vec::new();
    for (candidate_id, distance) in candidates {
        // Candidates arrive by ascending distance; everything past the
        // threshold boundary is ineligible too.
        if distance > max_distance {
            break;
        }
        if results.len() >= limit {
            break;
        }

        let row: Option<(String, String, Option<String>)> = conn
            .query_row(
                "SELECT content, type, metadata FROM memories WHERE id = ?1 AND owner_id = ?2",
                params![candidate_id, owner],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((content, row_type, metadata_json)) = row else {
            continue; // another owner's record, or vec row without a memory
        };
        if let Some(filter) = type_filter {
            if row_type != filter.as_str() {
                continue;
            }
        }

        results.push(SimilarityResult {
            id: candidate_id,
            content,
            metadata: parse_metadata(metadata_json),
            similarity: l2_to_cosine_sim(distance),
        });
    }

    Ok(results)
}

/// Plain substring search over title and content — the degraded mode when no
/// embedding capability exists. Matches carry the documented sentinel score.
pub fn query_by_substring(
    conn: &Connection,
    owner: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<SimilarityResult>> {
    let pattern = format!("%{}%", escape_like(query));
    let mut stmt = conn.prepare(
        "SELECT id, content, metadata FROM memories \
         WHERE owner_id = ?1 AND (title LIKE ?2 ESCAPE '\\' OR content LIKE ?2 ESCAPE '\\') \
         ORDER BY created_at DESC LIMIT ?3",
    )?;
    let results = stmt
        .query_map(params![owner, pattern, limit as i64], |row| {
            Ok(SimilarityResult {
                id: row.get(0)?,
                content: row.get(1)?,
                metadata: parse_metadata(row.get(2)?),
                similarity: SUBSTRING_SENTINEL_SCORE,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(results)
}

/// All records for one owner, newest first. Used for stats aggregation.
pub fn list_by_owner(conn: &Connection, owner: &str) -> Result<Vec<MemoryRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, owner_id, title, content, tags, type, context, metadata, has_embedding, created_at, updated_at \
         FROM memories WHERE owner_id = ?1 ORDER BY created_at DESC",
    )?;
    let rows = stmt
        .query_map(params![owner], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, bool>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, String>(10)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut records = Vec::with_capacity(rows.len());
    for (id, owner_id, title, content, tags, type_str, context, metadata, has_embedding, created_at, updated_at) in rows {
        records.push(MemoryRecord {
            id,
            owner_id,
            title,
            content,
            tags: serde_json::from_str(&tags).unwrap_or_default(),
            memory_type: type_str.parse().unwrap_or_default(),
            context,
            metadata: parse_metadata(metadata),
            has_embedding,
            created_at,
            updated_at,
        });
    }
    Ok(records)
}

/// Every stored embedding joined with its record, for local-index rebuild.
pub fn embedded_entries(conn: &Connection) -> Result<Vec<EmbeddedEntry>> {
    let mut stmt = conn.prepare(
        "SELECT v.id, m.owner_id, m.content, v.embedding \
         FROM memories_vec v JOIN memories m ON m.id = v.id",
    )?;
    let entries = stmt
        .query_map([], |row| {
            Ok(EmbeddedEntry {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                snippet: truncate_snippet(&row.get::<_, String>(2)?, SNIPPET_MAX_CHARS),
                embedding: bytes_to_embedding(&row.get::<_, Vec<u8>>(3)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            embedding.len() * std::mem::size_of::<f32>(),
        )
    }
}

/// Inverse of [`embedding_to_bytes`].
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Max L2 distance between unit vectors whose cosine similarity is at least
/// `threshold`: `d² = 2(1 - cos)`.
pub fn cosine_threshold_to_l2(threshold: f32) -> f64 {
    let cos = f64::from(threshold.clamp(0.0, 1.0));
    (2.0 * (1.0 - cos)).sqrt()
}

/// Map a vec0 L2 distance between unit vectors back to cosine similarity.
pub fn l2_to_cosine_sim(distance: f64) -> f32 {
    let sim = 1.0 - (distance * distance) / 2.0;
    sim.clamp(0.0, 1.0) as f32
}

/// Escape `%`, `_`, and `\` for a LIKE pattern with `ESCAPE '\'`.
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Truncate on a char boundary, appending an ellipsis when content was cut.
pub fn truncate_snippet(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let truncated: String = content.chars().take(max_chars).collect();
    format!("{truncated}...")
}

fn dedup_tags(tags: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.iter()
        .filter(|t| seen.insert(t.as_str()))
        .cloned()
        .collect()
}

fn parse_metadata(json: Option<String>) -> Option<serde_json::Value> {
    json.and_then(|j| serde_json::from_str(&j).ok())
}
