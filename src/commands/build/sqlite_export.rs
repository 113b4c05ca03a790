use super::*;

const SQLITE_SCHEMA_VERSION: &str = "1";

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS recipes (
              recipe_id TEXT PRIMARY KEY,
              ordinal INTEGER NOT NULL,
              device_id TEXT NOT NULL,
              device_name TEXT NOT NULL,
              manufacturing_time_seconds INTEGER,
              provenance TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS recipe_items (
              recipe_id TEXT NOT NULL,
              role TEXT NOT NULL,
              position INTEGER NOT NULL,
              item_id TEXT NOT NULL,
              item_name TEXT NOT NULL,
              count TEXT NOT NULL,
              PRIMARY KEY (recipe_id, role, position),
              FOREIGN KEY(recipe_id) REFERENCES recipes(recipe_id)
            );

            CREATE INDEX IF NOT EXISTS idx_recipes_device ON recipes(device_id);
            CREATE INDEX IF NOT EXISTS idx_recipe_items_item ON recipe_items(item_id, role);
            ",
        )
        .context("failed to create sqlite mirror schema")
}

/// Rewrites the SQLite mirror of `database` in a single transaction.
pub fn export_sqlite(db_path: &Path, database: &RecipeDatabase, run_id: &str) -> Result<()> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_directory(parent)?;
    }

    let mut connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;

    let tx = connection
        .transaction()
        .context("failed to start sqlite mirror transaction")?;

    tx.execute("DELETE FROM recipe_items", [])?;
    tx.execute("DELETE FROM recipes", [])?;

    {
        let mut insert_recipe = tx.prepare(
            "
            INSERT INTO recipes (
              recipe_id, ordinal, device_id, device_name, manufacturing_time_seconds, provenance
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )?;
        let mut insert_item = tx.prepare(
            "
            INSERT INTO recipe_items (recipe_id, role, position, item_id, item_name, count)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )?;

        for record in database.recipes.values() {
            let ordinal = recipe_ordinal(&record.id).map(|value| value as i64);
            insert_recipe
                .execute(params![
                    record.id,
                    ordinal,
                    record.device_id,
                    record.device_name,
                    record.manufacturing_time_seconds,
                    record.provenance.as_str(),
                ])
                .with_context(|| format!("failed to insert recipe {}", record.id))?;

            let roles = [("material", &record.materials), ("product", &record.products)];
            for (role, amounts) in roles {
                for (position, amount) in amounts.iter().enumerate() {
                    insert_item
                        .execute(params![
                            record.id,
                            role,
                            position as i64,
                            amount.item_id,
                            amount.name,
                            amount.count,
                        ])
                        .with_context(|| {
                            format!("failed to insert {role} {} of {}", amount.item_id, record.id)
                        })?;
                }
            }
        }
    }

    for (key, value) in [
        ("schema_version", SQLITE_SCHEMA_VERSION.to_string()),
        ("run_id", run_id.to_string()),
        ("recipe_count", database.recipes.len().to_string()),
        ("updated_at", now_utc_string()),
    ] {
        tx.execute(
            "
            INSERT INTO metadata (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            ",
            params![key, value],
        )?;
    }

    tx.commit().context("failed to commit sqlite mirror")?;
    Ok(())
}
