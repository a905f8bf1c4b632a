use std::collections::{BTreeSet, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::params::ParamEstimate;
use crate::types::{
    AnalysisResult, AuthorCacheEntry, Candidate, SkipRecord, TrustTier, WhitelistEntry,
    WhitelistOrigin,
};

pub mod sqlite;
pub use sqlite::SqliteStorage;

/// Durable state behind the pipeline. A dry run never calls the mutating
/// half of this trait.
#[async_trait]
pub trait ScoutStorage: Send + Sync {
    // Run metadata
    async fn last_run(&self) -> Result<Option<DateTime<Utc>>>;
    async fn set_last_run(&self, ts: DateTime<Utc>) -> Result<()>;

    // Author cache
    async fn get_author(&self, namespace: &str) -> Result<Option<AuthorCacheEntry>>;
    async fn upsert_author(&self, entry: &AuthorCacheEntry) -> Result<()>;

    // Dynamic whitelist
    async fn dynamic_whitelist(&self) -> Result<BTreeSet<String>>;
    async fn dynamic_whitelist_entries(&self) -> Result<Vec<WhitelistEntry>>;
    async fn upsert_dynamic_whitelist(
        &self,
        namespace: &str,
        origin: WhitelistOrigin,
        now: DateTime<Utc>,
    ) -> Result<()>;
    async fn remove_dynamic_whitelist(&self, namespaces: &[String]) -> Result<u64>;
    async fn prune_dynamic_whitelist(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>>;

    // Dynamic blacklist
    async fn dynamic_blacklist(&self) -> Result<BTreeSet<String>>;
    async fn upsert_dynamic_blacklist(
        &self,
        namespace: &str,
        reason: &str,
        count: i64,
        now: DateTime<Utc>,
    ) -> Result<()>;

    // Candidates and analyses
    async fn known_model_ids(&self) -> Result<HashSet<String>>;
    async fn model_last_modified(&self, model_id: &str) -> Result<Option<DateTime<Utc>>>;
    async fn save_analysis(
        &self,
        candidate: &Candidate,
        tier: TrustTier,
        analysis: &AnalysisResult,
        params: &ParamEstimate,
    ) -> Result<()>;
    async fn append_skip(&self, record: &SkipRecord, at: DateTime<Utc>) -> Result<()>;
}
