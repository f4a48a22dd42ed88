use crate::errors::{AggregatorError, AggregatorResult};
use crate::pnl::{validate_capital, Entity};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub type DbPool = Arc<Mutex<Connection>>;

const SCHEMA: &str = include_str!("../migrations/001_init.sql");

pub fn init_db(data_dir: &Path) -> AggregatorResult<DbPool> {
    std::fs::create_dir_all(data_dir).map_err(|e| AggregatorError::Database(format!("create dir: {e}")))?;
    let db_path = data_dir.join("fifto_pnl.db");
    let conn = Connection::open(&db_path)?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
    conn.execute_batch(SCHEMA)?;

    tracing::info!("database initialized at {}", db_path.display());
    Ok(Arc::new(Mutex::new(conn)))
}

#[cfg(test)]
pub fn init_memory_db() -> AggregatorResult<DbPool> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA)?;
    Ok(Arc::new(Mutex::new(conn)))
}

fn lock(db: &DbPool) -> AggregatorResult<MutexGuard<'_, Connection>> {
    db.lock().map_err(|e| AggregatorError::Database(format!("lock poisoned: {e}")))
}

// ── Entity registry ──

const ENTITY_COLUMNS: &str = "id, name, source_url, capital, created_at";

fn entity_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entity> {
    Ok(Entity {
        id: row.get(0)?,
        name: row.get(1)?,
        source_url: row.get(2)?,
        capital: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Register a new entity under a generated `client-<uuid>` id.
pub fn register_entity(db: &DbPool, name: &str, source_url: &str, capital: f64) -> AggregatorResult<Entity> {
    let id = format!("client-{}", uuid::Uuid::new_v4());
    let entity = Entity::new(id, name, source_url, capital)?;
    insert_entity(db, &entity)?;
    tracing::info!(entity = %entity.id, name = %entity.name, capital = entity.capital, "entity registered");
    Ok(entity)
}

pub fn insert_entity(db: &DbPool, entity: &Entity) -> AggregatorResult<()> {
    let conn = lock(db)?;
    conn.execute(
        "INSERT INTO entities (id, name, source_url, capital, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![entity.id, entity.name, entity.source_url, entity.capital, entity.created_at],
    )?;
    Ok(())
}

/// Post-hoc correction of name and/or capital.
pub fn update_entity(
    db: &DbPool,
    id: &str,
    name: Option<&str>,
    capital: Option<f64>,
) -> AggregatorResult<Entity> {
    let name = match name.map(str::trim) {
        Some("") => return Err(AggregatorError::InvalidEntity("name must not be empty".into())),
        other => other,
    };
    let capital = capital.map(validate_capital).transpose()?;

    let conn = lock(db)?;
    let changed = conn.execute(
        "UPDATE entities
         SET name = COALESCE(?1, name), capital = COALESCE(?2, capital), updated_at = datetime('now')
         WHERE id = ?3",
        rusqlite::params![name, capital, id],
    )?;
    if changed == 0 {
        return Err(AggregatorError::UnknownEntity(id.to_string()));
    }
    get_entity_inner(&conn, id)?.ok_or_else(|| AggregatorError::UnknownEntity(id.to_string()))
}

pub fn get_entity(db: &DbPool, id: &str) -> AggregatorResult<Entity> {
    let conn = lock(db)?;
    get_entity_inner(&conn, id)?.ok_or_else(|| AggregatorError::UnknownEntity(id.to_string()))
}

fn get_entity_inner(conn: &Connection, id: &str) -> AggregatorResult<Option<Entity>> {
    let entity = conn
        .query_row(
            &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = ?1"),
            rusqlite::params![id],
            entity_from_row,
        )
        .optional()?;
    Ok(entity)
}

pub fn list_entities(db: &DbPool) -> AggregatorResult<Vec<Entity>> {
    let conn = lock(db)?;
    let mut stmt = conn.prepare(&format!("SELECT {ENTITY_COLUMNS} FROM entities ORDER BY created_at, id"))?;
    let rows = stmt.query_map([], entity_from_row)?;
    let entities = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(entities)
}

/// Resolve a selection of ids, in the order given. Any unknown id fails the lookup.
pub fn get_entities(db: &DbPool, ids: &[String]) -> AggregatorResult<Vec<Entity>> {
    let conn = lock(db)?;
    ids.iter()
        .map(|id| get_entity_inner(&conn, id)?.ok_or_else(|| AggregatorError::UnknownEntity(id.clone())))
        .collect()
}

// ── Series cache ──

#[derive(Debug, Clone)]
pub struct CachedSeries {
    pub payload: String,
    pub fetched_at: i64,
}

pub fn get_cached_series(db: &DbPool, entity_id: &str) -> AggregatorResult<Option<CachedSeries>> {
    let conn = lock(db)?;
    let row = conn
        .query_row(
            "SELECT payload, fetched_at FROM series_cache WHERE entity_id = ?1",
            rusqlite::params![entity_id],
            |row| {
                Ok(CachedSeries {
                    payload: row.get(0)?,
                    fetched_at: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

pub fn put_cached_series(db: &DbPool, entity_id: &str, payload: &str, fetched_at: i64) -> AggregatorResult<()> {
    let conn = lock(db)?;
    conn.execute(
        "INSERT OR REPLACE INTO series_cache (entity_id, payload, fetched_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![entity_id, payload, fetched_at],
    )?;
    Ok(())
}

/// Returns whether a cached row existed.
pub fn invalidate_cached_series(db: &DbPool, entity_id: &str) -> AggregatorResult<bool> {
    let conn = lock(db)?;
    let removed = conn.execute(
        "DELETE FROM series_cache WHERE entity_id = ?1",
        rusqlite::params![entity_id],
    )?;
    Ok(removed > 0)
}
