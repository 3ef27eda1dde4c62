//! SQLite save slots.
//!
//! Payloads are stored as raw JSON text and read back untyped, so a slot
//! written by an older build goes through [`crate::migrate()`] on load.

use std::str::FromStr;

use anyhow::Context;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::envelope::SaveEnvelope;

/// Open (creating if needed) the database at `url` and apply the embedded migrations.
pub async fn init_db(url: &str) -> anyhow::Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid sqlite url {url}"))?
        .create_if_missing(true);
    // One long-lived connection keeps `sqlite::memory:` databases alive.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(opts)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// Insert or overwrite a slot.
pub async fn write_save(pool: &SqlitePool, slot: &str, envelope: &SaveEnvelope) -> anyhow::Result<()> {
    let payload = serde_json::to_string(envelope)?;
    sqlx::query(
        r"INSERT INTO saves (slot, schema_version, saved_at_ms, payload)
          VALUES (?1, ?2, ?3, ?4)
          ON CONFLICT (slot) DO UPDATE SET
            schema_version = excluded.schema_version,
            saved_at_ms = excluded.saved_at_ms,
            payload = excluded.payload",
    )
    .bind(slot)
    .bind(i64::from(envelope.schema_version))
    .bind(envelope.saved_at_epoch_ms)
    .bind(payload)
    .execute(pool)
    .await?;
    debug!(slot, version = envelope.schema_version, "save written");
    Ok(())
}

/// Raw payload of a slot; `None` if the slot is empty.
pub async fn read_save(pool: &SqlitePool, slot: &str) -> anyhow::Result<Option<Value>> {
    let row = sqlx::query_as::<_, (String,)>("SELECT payload FROM saves WHERE slot = ?1")
        .bind(slot)
        .fetch_optional(pool)
        .await?;
    match row {
        Some((payload,)) => {
            let value = serde_json::from_str(&payload).with_context(|| format!("slot {slot} holds invalid json"))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

pub async fn list_slots(pool: &SqlitePool) -> anyhow::Result<Vec<String>> {
    let rows = sqlx::query_as::<_, (String,)>("SELECT slot FROM saves ORDER BY slot")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(slot,)| slot).collect())
}

/// Returns whether a slot was removed.
pub async fn delete_save(pool: &SqlitePool, slot: &str) -> anyhow::Result<bool> {
    let done = sqlx::query("DELETE FROM saves WHERE slot = ?1")
        .bind(slot)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() > 0)
}
