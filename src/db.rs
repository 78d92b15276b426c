//! Raw resource catalog storage

use rusqlite::Connection;

use crate::Result;
use crate::catalog::{BUILTIN_RAW_RESOURCES, RawResourceMeta, ResourceCatalog};
use crate::models::ItemId;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Presentation metadata for raw resources
        CREATE TABLE IF NOT EXISTS raw_resources (
            item_id INTEGER PRIMARY KEY,
            display_name TEXT NOT NULL,
            global_limit REAL NOT NULL,
            color TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

/// Insert or replace a raw resource
pub fn upsert_raw_resource(conn: &Connection, item: ItemId, meta: &RawResourceMeta) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO raw_resources (item_id, display_name, global_limit, color)
         VALUES (?1, ?2, ?3, ?4)",
        (item.0, &meta.display_name, meta.global_limit, &meta.color),
    )?;
    Ok(())
}

pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM raw_resources", [])?;
    Ok(())
}

/// Replace the stored catalog with the built-in raw resources
pub fn seed_builtin_catalog(conn: &Connection) -> Result<usize> {
    clear_catalog(conn)?;
    for (id, name, limit, color) in BUILTIN_RAW_RESOURCES {
        upsert_raw_resource(conn, ItemId(*id), &RawResourceMeta::new(*name, *limit, color)?)?;
    }
    Ok(BUILTIN_RAW_RESOURCES.len())
}

/// Load the catalog; gradients are derived from the stored colours
pub fn load_catalog(conn: &Connection) -> Result<ResourceCatalog> {
    let mut stmt = conn.prepare(
        "SELECT item_id, display_name, global_limit, color FROM raw_resources ORDER BY item_id",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, u32>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut catalog = ResourceCatalog::default();
    for row in rows {
        let (id, name, limit, color) = row?;
        catalog.insert(ItemId(id), RawResourceMeta::new(name, limit, &color)?);
    }
    Ok(catalog)
}
