use std::collections::HashMap;

use anyhow::Result;
use chrono::{Duration, Utc};

use crate::config::Config;
use crate::storage::ScoutStorage;
use crate::traits::HubClient;
use crate::types::{AuthorCacheEntry, AuthorKind, ProfileLookup, TrustTier};

/// Tier plus the facts that decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustClassification {
    pub tier: TrustTier,
    pub kind: Option<AuthorKind>,
    pub followers: i64,
    pub is_pro: bool,
}

impl TrustClassification {
    fn unknown() -> Self {
        Self {
            tier: TrustTier::Tier1,
            kind: None,
            followers: 0,
            is_pro: false,
        }
    }
}

/// Resolves namespaces to trust tiers through two cache layers: the
/// persisted author cache (TTL-bounded) and a per-run memo so each
/// namespace is resolved at most once per run.
pub struct TrustClassifier {
    ttl: Duration,
    tier2_followers: i64,
    max_retries: u32,
    run_memo: HashMap<String, TrustClassification>,
}

impl TrustClassifier {
    pub fn new(config: &Config) -> Self {
        Self {
            ttl: Duration::days(config.author_cache_ttl_days),
            tier2_followers: config.tier2_follower_threshold,
            max_retries: config.max_retries,
            run_memo: HashMap::new(),
        }
    }

    pub async fn classify(
        &mut self,
        namespace: &str,
        hub: &dyn HubClient,
        storage: &dyn ScoutStorage,
        dry_run: bool,
    ) -> Result<TrustClassification> {
        if let Some(hit) = self.run_memo.get(namespace) {
            return Ok(*hit);
        }

        let classification = self.resolve(namespace, hub, storage, dry_run).await?;
        self.run_memo
            .insert(namespace.to_string(), classification);
        Ok(classification)
    }

    async fn resolve(
        &self,
        namespace: &str,
        hub: &dyn HubClient,
        storage: &dyn ScoutStorage,
        dry_run: bool,
    ) -> Result<TrustClassification> {
        let now = Utc::now();

        if let Some(entry) = storage.get_author(namespace).await? {
            if now - entry.checked_at < self.ttl {
                tracing::debug!(namespace = %namespace, kind = ?entry.kind, "author cache hit");
                return Ok(self.classify_entry(&entry));
            }
        }

        tracing::info!(namespace = %namespace, "resolving author profile");
        let lookup = self.resolve_with_retry(namespace, hub).await;

        let lookup = match lookup {
            Ok(lookup) => lookup,
            Err(e) => {
                // Transient resolution failure: treat as Tier1 for this run
                // without caching, so the namespace is retried next time.
                tracing::warn!(namespace = %namespace, error = %e, "profile resolution failed");
                return Ok(TrustClassification::unknown());
            }
        };

        let entry = match lookup {
            ProfileLookup::Organization => AuthorCacheEntry {
                namespace: namespace.to_string(),
                kind: AuthorKind::Org,
                followers: 0,
                is_pro: false,
                checked_at: now,
            },
            ProfileLookup::User { followers, is_pro } => AuthorCacheEntry {
                namespace: namespace.to_string(),
                kind: AuthorKind::User,
                followers,
                is_pro,
                checked_at: now,
            },
            // A not-found result is never written to the cache: a freshly
            // created account must be re-evaluated on its next encounter,
            // not stuck at "unknown" for the TTL window.
            ProfileLookup::NotFound => {
                return Ok(TrustClassification::unknown());
            }
        };

        if !dry_run {
            storage.upsert_author(&entry).await?;
        }
        Ok(self.classify_entry(&entry))
    }

    async fn resolve_with_retry(
        &self,
        namespace: &str,
        hub: &dyn HubClient,
    ) -> Result<ProfileLookup, crate::error::HubError> {
        let mut last_err = None;
        for attempt in 0..self.max_retries.max(1) {
            match hub.resolve_profile(namespace).await {
                Ok(lookup) => return Ok(lookup),
                Err(e) if e.is_transient() && attempt + 1 < self.max_retries.max(1) => {
                    tracing::debug!(namespace = %namespace, attempt, error = %e, "retrying profile lookup");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(crate::error::HubError::Timeout))
    }

    fn classify_entry(&self, entry: &AuthorCacheEntry) -> TrustClassification {
        let tier = match entry.kind {
            AuthorKind::Org => TrustTier::Tier3,
            AuthorKind::User => {
                if entry.followers >= self.tier2_followers || entry.is_pro {
                    TrustTier::Tier2
                } else {
                    TrustTier::Tier1
                }
            }
        };
        TrustClassification {
            tier,
            kind: Some(entry.kind),
            followers: entry.followers,
            is_pro: entry.is_pro,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MemoryStorage, ScriptedHub};
    use chrono::Duration;

    fn classifier() -> TrustClassifier {
        TrustClassifier::new(&Config::default())
    }

    #[tokio::test]
    async fn org_is_tier3_and_cached() {
        let storage = MemoryStorage::default();
        let hub = ScriptedHub::default().with_profile("acme-labs", ProfileLookup::Organization);
        let mut trust = classifier();

        let got = trust
            .classify("acme-labs", &hub, &storage, false)
            .await
            .unwrap();
        assert_eq!(got.tier, TrustTier::Tier3);
        assert!(storage.get_author("acme-labs").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn follower_threshold_promotes_to_tier2() {
        let storage = MemoryStorage::default();
        let hub = ScriptedHub::default().with_profile(
            "busy-user",
            ProfileLookup::User {
                followers: 500,
                is_pro: false,
            },
        );
        let mut trust = classifier();
        let got = trust
            .classify("busy-user", &hub, &storage, false)
            .await
            .unwrap();
        assert_eq!(got.tier, TrustTier::Tier2);
    }

    #[tokio::test]
    async fn pro_status_promotes_to_tier2() {
        let storage = MemoryStorage::default();
        let hub = ScriptedHub::default().with_profile(
            "pro-user",
            ProfileLookup::User {
                followers: 0,
                is_pro: true,
            },
        );
        let mut trust = classifier();
        let got = trust
            .classify("pro-user", &hub, &storage, false)
            .await
            .unwrap();
        assert_eq!(got.tier, TrustTier::Tier2);
    }

    #[tokio::test]
    async fn not_found_is_never_cached() {
        let storage = MemoryStorage::default();
        let hub = ScriptedHub::default().with_profile("ghost", ProfileLookup::NotFound);
        let mut trust = classifier();

        let got = trust.classify("ghost", &hub, &storage, false).await.unwrap();
        assert_eq!(got.tier, TrustTier::Tier1);
        assert!(storage.get_author("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_cache_entry_is_reresolved() {
        let storage = MemoryStorage::default();
        storage
            .upsert_author(&AuthorCacheEntry {
                namespace: "old-user".into(),
                kind: AuthorKind::User,
                followers: 0,
                is_pro: false,
                checked_at: Utc::now() - Duration::days(30),
            })
            .await
            .unwrap();
        let hub = ScriptedHub::default().with_profile("old-user", ProfileLookup::Organization);
        let mut trust = classifier();

        let got = trust
            .classify("old-user", &hub, &storage, false)
            .await
            .unwrap();
        assert_eq!(got.tier, TrustTier::Tier3);
        assert_eq!(hub.profile_calls("old-user"), 1);
    }

    #[tokio::test]
    async fn fresh_cache_entry_avoids_the_hub() {
        let storage = MemoryStorage::default();
        storage
            .upsert_author(&AuthorCacheEntry {
                namespace: "cached-org".into(),
                kind: AuthorKind::Org,
                followers: 0,
                is_pro: false,
                checked_at: Utc::now() - Duration::days(1),
            })
            .await
            .unwrap();
        let hub = ScriptedHub::default();
        let mut trust = classifier();

        let got = trust
            .classify("cached-org", &hub, &storage, false)
            .await
            .unwrap();
        assert_eq!(got.tier, TrustTier::Tier3);
        assert_eq!(hub.profile_calls("cached-org"), 0);
    }

    #[tokio::test]
    async fn run_memo_resolves_each_namespace_once() {
        let storage = MemoryStorage::default();
        let hub = ScriptedHub::default().with_profile("acme-labs", ProfileLookup::Organization);
        let mut trust = classifier();

        trust
            .classify("acme-labs", &hub, &storage, false)
            .await
            .unwrap();
        trust
            .classify("acme-labs", &hub, &storage, false)
            .await
            .unwrap();
        assert_eq!(hub.profile_calls("acme-labs"), 1);
    }
}
