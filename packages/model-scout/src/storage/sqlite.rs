use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::Row;

use crate::params::ParamEstimate;
use crate::storage::ScoutStorage;
use crate::types::{
    AnalysisResult, AuthorCacheEntry, AuthorKind, Candidate, SkipRecord, TrustTier, WhitelistEntry,
    WhitelistOrigin,
};

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) the database at `path` and ensure the schema.
    pub async fn connect(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
            .with_context(|| format!("Invalid database path '{path}'"))?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .with_context(|| format!("Failed to open database at '{path}'"))?;
        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS authors (
                namespace TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                followers INTEGER NOT NULL DEFAULT 0,
                is_pro INTEGER NOT NULL DEFAULT 0,
                checked_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS dynamic_whitelist (
                namespace TEXT PRIMARY KEY,
                origin TEXT NOT NULL,
                last_seen TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS dynamic_blacklist (
                namespace TEXT PRIMARY KEY,
                reason TEXT NOT NULL,
                skip_count INTEGER NOT NULL DEFAULT 0,
                added_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS models (
                model_id TEXT PRIMARY KEY,
                namespace TEXT NOT NULL,
                name TEXT NOT NULL,
                tier INTEGER NOT NULL,
                params_total_b REAL,
                params_source TEXT NOT NULL DEFAULT 'unknown',
                analysis TEXT NOT NULL,
                last_modified TEXT NOT NULL,
                analyzed_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS skips (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                model_id TEXT NOT NULL,
                namespace TEXT NOT NULL,
                stage TEXT NOT NULL,
                reason TEXT NOT NULL,
                detail TEXT,
                skipped_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_skips_namespace ON skips (namespace);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to run schema migration")?;
        Ok(())
    }
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .with_context(|| format!("Invalid stored timestamp '{raw}'"))
}

#[async_trait]
impl ScoutStorage for SqliteStorage {
    async fn last_run(&self) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT value FROM meta WHERE key = 'last_run'")
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read last run timestamp")?;
        row.map(|r| parse_ts(&r.get::<String, _>("value"))).transpose()
    }

    async fn set_last_run(&self, ts: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO meta (key, value) VALUES ('last_run', $1)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(ts.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to write last run timestamp")?;
        Ok(())
    }

    async fn get_author(&self, namespace: &str) -> Result<Option<AuthorCacheEntry>> {
        let row = sqlx::query(
            "SELECT namespace, kind, followers, is_pro, checked_at FROM authors WHERE namespace = $1",
        )
        .bind(namespace)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to read author cache")?;

        row.map(|r| {
            let kind = match r.get::<String, _>("kind").as_str() {
                "org" => AuthorKind::Org,
                _ => AuthorKind::User,
            };
            Ok(AuthorCacheEntry {
                namespace: r.get("namespace"),
                kind,
                followers: r.get("followers"),
                is_pro: r.get::<i64, _>("is_pro") != 0,
                checked_at: parse_ts(&r.get::<String, _>("checked_at"))?,
            })
        })
        .transpose()
    }

    async fn upsert_author(&self, entry: &AuthorCacheEntry) -> Result<()> {
        let kind = match entry.kind {
            AuthorKind::Org => "org",
            AuthorKind::User => "user",
        };
        sqlx::query(
            r#"
            INSERT INTO authors (namespace, kind, followers, is_pro, checked_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (namespace) DO UPDATE SET
                kind = excluded.kind,
                followers = excluded.followers,
                is_pro = excluded.is_pro,
                checked_at = excluded.checked_at
            "#,
        )
        .bind(&entry.namespace)
        .bind(kind)
        .bind(entry.followers)
        .bind(entry.is_pro as i64)
        .bind(entry.checked_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to upsert author cache entry")?;
        Ok(())
    }

    async fn dynamic_whitelist(&self) -> Result<BTreeSet<String>> {
        let rows = sqlx::query("SELECT namespace FROM dynamic_whitelist")
            .fetch_all(&self.pool)
            .await
            .context("Failed to read dynamic whitelist")?;
        Ok(rows.into_iter().map(|r| r.get("namespace")).collect())
    }

    async fn dynamic_whitelist_entries(&self) -> Result<Vec<WhitelistEntry>> {
        let rows = sqlx::query(
            "SELECT namespace, origin, last_seen FROM dynamic_whitelist ORDER BY namespace",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to read dynamic whitelist entries")?;
        rows.into_iter()
            .map(|r| {
                Ok(WhitelistEntry {
                    namespace: r.get("namespace"),
                    origin: WhitelistOrigin::parse(&r.get::<String, _>("origin")),
                    last_seen: parse_ts(&r.get::<String, _>("last_seen"))?,
                })
            })
            .collect()
    }

    async fn upsert_dynamic_whitelist(
        &self,
        namespace: &str,
        origin: WhitelistOrigin,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dynamic_whitelist (namespace, origin, last_seen)
            VALUES ($1, $2, $3)
            ON CONFLICT (namespace) DO UPDATE SET
                origin = excluded.origin,
                last_seen = MAX(dynamic_whitelist.last_seen, excluded.last_seen)
            "#,
        )
        .bind(namespace)
        .bind(origin.as_str())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to upsert dynamic whitelist entry")?;
        Ok(())
    }

    async fn remove_dynamic_whitelist(&self, namespaces: &[String]) -> Result<u64> {
        let mut removed = 0;
        for ns in namespaces {
            let result = sqlx::query("DELETE FROM dynamic_whitelist WHERE namespace = $1")
                .bind(ns)
                .execute(&self.pool)
                .await
                .context("Failed to remove dynamic whitelist entry")?;
            removed += result.rows_affected();
        }
        Ok(removed)
    }

    async fn prune_dynamic_whitelist(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT namespace FROM dynamic_whitelist WHERE last_seen < $1 ORDER BY namespace",
        )
        .bind(cutoff.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list stale dynamic whitelist entries")?;
        let stale: Vec<String> = rows.into_iter().map(|r| r.get("namespace")).collect();

        sqlx::query("DELETE FROM dynamic_whitelist WHERE last_seen < $1")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await
            .context("Failed to prune dynamic whitelist")?;
        Ok(stale)
    }

    async fn dynamic_blacklist(&self) -> Result<BTreeSet<String>> {
        let rows = sqlx::query("SELECT namespace FROM dynamic_blacklist")
            .fetch_all(&self.pool)
            .await
            .context("Failed to read dynamic blacklist")?;
        Ok(rows.into_iter().map(|r| r.get("namespace")).collect())
    }

    async fn upsert_dynamic_blacklist(
        &self,
        namespace: &str,
        reason: &str,
        count: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dynamic_blacklist (namespace, reason, skip_count, added_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (namespace) DO UPDATE SET
                reason = excluded.reason,
                skip_count = dynamic_blacklist.skip_count + excluded.skip_count
            "#,
        )
        .bind(namespace)
        .bind(reason)
        .bind(count)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to upsert dynamic blacklist entry")?;
        Ok(())
    }

    async fn known_model_ids(&self) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT model_id FROM models")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list known model ids")?;
        Ok(rows.into_iter().map(|r| r.get("model_id")).collect())
    }

    async fn model_last_modified(&self, model_id: &str) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT last_modified FROM models WHERE model_id = $1")
            .bind(model_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read model last-modified")?;
        row.map(|r| parse_ts(&r.get::<String, _>("last_modified")))
            .transpose()
    }

    async fn save_analysis(
        &self,
        candidate: &Candidate,
        tier: TrustTier,
        analysis: &AnalysisResult,
        params: &ParamEstimate,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO models (
                model_id, namespace, name, tier, params_total_b, params_source,
                analysis, last_modified, analyzed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (model_id) DO UPDATE SET
                tier = excluded.tier,
                params_total_b = excluded.params_total_b,
                params_source = excluded.params_source,
                analysis = excluded.analysis,
                last_modified = excluded.last_modified,
                analyzed_at = excluded.analyzed_at
            "#,
        )
        .bind(&candidate.id)
        .bind(&candidate.namespace)
        .bind(&candidate.name)
        .bind(tier.as_i64())
        .bind(params.total_b)
        .bind(params.source.as_str())
        .bind(serde_json::to_string(analysis)?)
        .bind(candidate.last_modified.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save analysis")?;
        Ok(())
    }

    async fn append_skip(&self, record: &SkipRecord, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO skips (model_id, namespace, stage, reason, detail, skipped_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&record.model_id)
        .bind(&record.namespace)
        .bind(record.stage.as_str())
        .bind(record.reason.as_str())
        .bind(&record.detail)
        .bind(at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to append skip record")?;
        Ok(())
    }
}
