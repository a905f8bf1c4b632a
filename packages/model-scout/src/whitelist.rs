use anyhow::Result;
use chrono::{Duration, Utc};

use crate::config::Config;
use crate::policy::{normalize_namespace, NamespacePolicy};
use crate::stats::RunStats;
use crate::storage::ScoutStorage;
use crate::types::{SkipReason, TrustTier, WhitelistOrigin};

/// Maintains the persisted dynamic whitelist and blacklist. Observations
/// feed in during a run; admin operations (promote/remove/prune) come from
/// the CLI. All operations are idempotent.
pub struct DynamicWhitelistManager {
    enabled: bool,
    tier3_auto_add: bool,
    tier2_review_enabled: bool,
    no_readme_min: u64,
}

impl DynamicWhitelistManager {
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.dynamic_whitelist_enabled,
            tier3_auto_add: config.tier3_auto_add,
            tier2_review_enabled: config.tier2_review_enabled,
            no_readme_min: config.dynamic_blacklist_no_readme_min,
        }
    }

    /// Called once per classified candidate. Tier3 orgs are auto-added to
    /// the dynamic whitelist unless blacklisted; Tier2 users are surfaced
    /// as review candidates in the run stats without being persisted.
    pub async fn record_observation(
        &self,
        namespace: &str,
        tier: TrustTier,
        policy: &mut NamespacePolicy,
        storage: &dyn ScoutStorage,
        stats: &mut RunStats,
        dry_run: bool,
    ) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let key = normalize_namespace(namespace);
        match tier {
            TrustTier::Tier3 if self.tier3_auto_add && !policy.is_blacklisted(&key) => {
                if !dry_run {
                    storage
                        .upsert_dynamic_whitelist(&key, WhitelistOrigin::Tier3Org, Utc::now())
                        .await?;
                }
                policy.note_dynamic_whitelist(&key);
                tracing::debug!(namespace = %key, "dynamic whitelist refresh");
            }
            // Blacklist precedence holds for review surfacing too.
            TrustTier::Tier2 if self.tier2_review_enabled && !policy.is_blacklisted(&key) => {
                stats.record_review_candidate(&key);
            }
            _ => {}
        }
        Ok(())
    }

    /// Persist a manual whitelist addition. Blacklisted namespaces are
    /// refused rather than silently shadowed.
    pub async fn promote(
        &self,
        namespaces: &[String],
        policy: &NamespacePolicy,
        storage: &dyn ScoutStorage,
    ) -> Result<Vec<String>> {
        let mut added = Vec::new();
        for ns in namespaces {
            let key = normalize_namespace(ns);
            if policy.is_blacklisted(&key) {
                tracing::warn!(namespace = %key, "refusing to whitelist a blacklisted namespace");
                continue;
            }
            if policy.is_statically_whitelisted(&key) {
                tracing::info!(namespace = %key, "already on the static whitelist");
                continue;
            }
            storage
                .upsert_dynamic_whitelist(&key, WhitelistOrigin::Manual, Utc::now())
                .await?;
            added.push(key);
        }
        Ok(added)
    }

    /// Remove dynamic entries. Static list membership is compiled in and
    /// not removable here.
    pub async fn remove(&self, namespaces: &[String], storage: &dyn ScoutStorage) -> Result<u64> {
        let keys: Vec<String> = namespaces.iter().map(|ns| normalize_namespace(ns)).collect();
        storage.remove_dynamic_whitelist(&keys).await
    }

    /// Drop dynamic entries not seen within `max_age_days`.
    pub async fn prune(&self, max_age_days: i64, storage: &dyn ScoutStorage) -> Result<Vec<String>> {
        let cutoff = Utc::now() - Duration::days(max_age_days);
        let pruned = storage.prune_dynamic_whitelist(cutoff).await?;
        if !pruned.is_empty() {
            tracing::info!(count = pruned.len(), "pruned stale dynamic whitelist entries");
        }
        Ok(pruned)
    }

    /// End-of-run blacklist promotion: uploaders whose dominant skip reason
    /// this run was a missing README, at or above the configured floor, are
    /// added to the persisted dynamic blacklist. Whitelisted namespaces are
    /// exempt.
    pub async fn promote_blacklist(
        &self,
        stats: &RunStats,
        policy: &NamespacePolicy,
        storage: &dyn ScoutStorage,
    ) -> Result<Vec<String>> {
        let mut promoted = Vec::new();
        for (ns, count) in
            stats.uploaders_dominated_by(SkipReason::NoReadme, self.no_readme_min as usize)
        {
            // Whitelisted (FastPass) and already-blacklisted namespaces are
            // both out of scope here.
            if policy.verdict(&ns) != crate::types::PolicyVerdict::Normal {
                continue;
            }
            storage
                .upsert_dynamic_blacklist(&ns, SkipReason::NoReadme.as_str(), count as i64, Utc::now())
                .await?;
            tracing::info!(namespace = %ns, count, "dynamic blacklist promotion");
            promoted.push(ns);
        }
        Ok(promoted)
    }
}
