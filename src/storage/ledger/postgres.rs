//! Ledger persisted in PostgreSQL, one row per identity.

use super::{AddOutcome, LedgerStore, OwnershipRecord, UpsertOutcome};
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

const RECORD_COLUMNS: &str = "npub, nostr_name, characters, inventory, created_at, last_login";

#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects and makes sure the `users` table exists.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                npub TEXT PRIMARY KEY,
                nostr_name TEXT,
                characters TEXT[] NOT NULL,
                inventory TEXT[] NOT NULL DEFAULT '{}',
                created_at TIMESTAMPTZ NOT NULL,
                last_login TIMESTAMPTZ
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn record_from_row(row: &PgRow) -> Result<OwnershipRecord> {
    Ok(OwnershipRecord {
        npub: row.try_get("npub")?,
        nostr_name: row.try_get("nostr_name")?,
        characters: row.try_get("characters")?,
        inventory: row.try_get("inventory")?,
        created_at: row.try_get("created_at")?,
        last_login: row.try_get("last_login")?,
    })
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn upsert_identity(&self, npub: &str, name: &str, seed_item: &str) -> Result<UpsertOutcome> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO users (npub, nostr_name, characters, inventory, created_at, last_login)
             VALUES ($1, $2, $3, '{}', $4, $4)
             ON CONFLICT (npub) DO NOTHING",
        )
        .bind(npub)
        .bind(name)
        .bind(vec![seed_item.to_string()])
        .bind(now)
        .execute(tx.as_mut())
        .await?
        .rows_affected();

        // The UPDATE takes the row lock, so concurrent logins serialize here.
        let row = sqlx::query(&format!(
            "UPDATE users SET nostr_name = $2, last_login = $3 WHERE npub = $1 RETURNING {}",
            RECORD_COLUMNS
        ))
        .bind(npub)
        .bind(name)
        .bind(now)
        .fetch_one(tx.as_mut())
        .await?;
        let user = record_from_row(&row)?;

        tx.commit().await?;
        Ok(UpsertOutcome {
            created: inserted == 1,
            user,
        })
    }

    async fn add_owned_item(&self, npub: &str, item: &str) -> Result<AddOutcome> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO users (npub, nostr_name, characters, inventory, created_at, last_login)
             VALUES ($1, NULL, $2, '{}', $3, NULL)
             ON CONFLICT (npub) DO NOTHING",
        )
        .bind(npub)
        .bind(vec![item.to_string()])
        .bind(Utc::now())
        .execute(tx.as_mut())
        .await?
        .rows_affected();

        let added = if inserted == 1 {
            true
        } else {
            sqlx::query(
                "UPDATE users SET characters = array_append(characters, $2)
                 WHERE npub = $1 AND NOT ($2 = ANY(characters))",
            )
            .bind(npub)
            .bind(item)
            .execute(tx.as_mut())
            .await?
            .rows_affected()
                == 1
        };

        tx.commit().await?;
        Ok(AddOutcome { added })
    }

    async fn owned_items(&self, npub: &str) -> Result<Vec<String>> {
        let items: Option<Vec<String>> =
            sqlx::query_scalar("SELECT characters FROM users WHERE npub = $1")
                .bind(npub)
                .fetch_optional(&self.pool)
                .await?;
        Ok(items.unwrap_or_default())
    }

    async fn get_record(&self, npub: &str) -> Result<Option<OwnershipRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE npub = $1", RECORD_COLUMNS))
            .bind(npub)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
