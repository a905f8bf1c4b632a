//! In-memory doubles and builders shared across unit tests.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{HubError, LlmError};
use crate::params::ParamEstimate;
use crate::storage::ScoutStorage;
use crate::traits::{AnalysisRequest, CompletionClient, HubClient};
use crate::types::{
    AnalysisResult, AuthorCacheEntry, Candidate, LlmAnalysis, ProfileLookup, RepoFile,
    SafetyStatus, SkipRecord, TrustTier, WhitelistEntry, WhitelistOrigin,
};

// ----------------------------------------------------------------------------
// Candidate builder
// ----------------------------------------------------------------------------

pub fn candidate_builder(id: &str) -> CandidateBuilder {
    let (namespace, name) = id.split_once('/').unwrap_or((id, id));
    CandidateBuilder {
        candidate: Candidate {
            id: id.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            tags: vec![],
            pipeline_tag: None,
            card_data: serde_json::Value::Null,
            readme: Some("A plainly documented model used in tests.".to_string()),
            files: vec![],
            created_at: Utc::now(),
            last_modified: Utc::now(),
            safety: SafetyStatus::Safe,
            safetensors_total_params: None,
        },
    }
}

pub struct CandidateBuilder {
    candidate: Candidate,
}

impl CandidateBuilder {
    pub fn readme(mut self, text: &str) -> Self {
        self.candidate.readme = Some(text.to_string());
        self
    }

    pub fn no_readme(mut self) -> Self {
        self.candidate.readme = None;
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.candidate.tags.push(tag.to_string());
        self
    }

    pub fn pipeline_tag(mut self, tag: &str) -> Self {
        self.candidate.pipeline_tag = Some(tag.to_string());
        self
    }

    pub fn card_data(mut self, card: serde_json::Value) -> Self {
        self.candidate.card_data = card;
        self
    }

    pub fn file(mut self, path: &str, size: u64) -> Self {
        self.candidate.files.push(RepoFile {
            path: path.to_string(),
            size,
            scan_status: SafetyStatus::Unknown,
        });
        self
    }

    pub fn flagged_file(mut self, path: &str, size: u64) -> Self {
        self.candidate.files.push(RepoFile {
            path: path.to_string(),
            size,
            scan_status: SafetyStatus::Flagged,
        });
        self
    }

    pub fn safety(mut self, status: SafetyStatus) -> Self {
        self.candidate.safety = status;
        self
    }

    pub fn safetensors_params(mut self, total: u64) -> Self {
        self.candidate.safetensors_total_params = Some(total);
        self
    }

    pub fn created_at(mut self, ts: DateTime<Utc>) -> Self {
        self.candidate.created_at = ts;
        self
    }

    pub fn last_modified(mut self, ts: DateTime<Utc>) -> Self {
        self.candidate.last_modified = ts;
        self
    }

    pub fn build(self) -> Candidate {
        self.candidate
    }
}

// ----------------------------------------------------------------------------
// Storage double
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SavedAnalysis {
    pub candidate_id: String,
    pub tier: TrustTier,
    pub analysis: AnalysisResult,
    pub params: ParamEstimate,
}

#[derive(Default)]
pub struct MemoryStorage {
    last_run: Mutex<Option<DateTime<Utc>>>,
    authors: Mutex<HashMap<String, AuthorCacheEntry>>,
    dynamic_whitelist: Mutex<BTreeMap<String, (WhitelistOrigin, DateTime<Utc>)>>,
    dynamic_blacklist: Mutex<BTreeMap<String, (String, i64)>>,
    models: Mutex<HashMap<String, DateTime<Utc>>>,
    analyses: Mutex<Vec<SavedAnalysis>>,
    skips: Mutex<Vec<SkipRecord>>,
    fail_writes: bool,
}

impl MemoryStorage {
    /// Variant whose analysis and skip writes always fail.
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn saved_analyses(&self) -> Vec<SavedAnalysis> {
        self.analyses.lock().unwrap().clone()
    }

    pub fn skips(&self) -> Vec<SkipRecord> {
        self.skips.lock().unwrap().clone()
    }

    pub fn seed_model(&self, model_id: &str, last_modified: DateTime<Utc>) {
        self.models
            .lock()
            .unwrap()
            .insert(model_id.to_string(), last_modified);
    }
}

#[async_trait]
impl ScoutStorage for MemoryStorage {
    async fn last_run(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(*self.last_run.lock().unwrap())
    }

    async fn set_last_run(&self, ts: DateTime<Utc>) -> Result<()> {
        *self.last_run.lock().unwrap() = Some(ts);
        Ok(())
    }

    async fn get_author(&self, namespace: &str) -> Result<Option<AuthorCacheEntry>> {
        Ok(self.authors.lock().unwrap().get(namespace).cloned())
    }

    async fn upsert_author(&self, entry: &AuthorCacheEntry) -> Result<()> {
        self.authors
            .lock()
            .unwrap()
            .insert(entry.namespace.clone(), entry.clone());
        Ok(())
    }

    async fn dynamic_whitelist(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .dynamic_whitelist
            .lock()
            .unwrap()
            .keys()
            .cloned()
            .collect())
    }

    async fn dynamic_whitelist_entries(&self) -> Result<Vec<WhitelistEntry>> {
        Ok(self
            .dynamic_whitelist
            .lock()
            .unwrap()
            .iter()
            .map(|(ns, (origin, last_seen))| WhitelistEntry {
                namespace: ns.clone(),
                origin: *origin,
                last_seen: *last_seen,
            })
            .collect())
    }

    async fn upsert_dynamic_whitelist(
        &self,
        namespace: &str,
        origin: WhitelistOrigin,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.dynamic_whitelist
            .lock()
            .unwrap()
            .insert(namespace.to_string(), (origin, now));
        Ok(())
    }

    async fn remove_dynamic_whitelist(&self, namespaces: &[String]) -> Result<u64> {
        let mut map = self.dynamic_whitelist.lock().unwrap();
        let before = map.len();
        for ns in namespaces {
            map.remove(ns);
        }
        Ok((before - map.len()) as u64)
    }

    async fn prune_dynamic_whitelist(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        let mut map = self.dynamic_whitelist.lock().unwrap();
        let stale: Vec<String> = map
            .iter()
            .filter(|(_, (_, seen))| *seen < cutoff)
            .map(|(ns, _)| ns.clone())
            .collect();
        for ns in &stale {
            map.remove(ns);
        }
        Ok(stale)
    }

    async fn dynamic_blacklist(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .dynamic_blacklist
            .lock()
            .unwrap()
            .keys()
            .cloned()
            .collect())
    }

    async fn upsert_dynamic_blacklist(
        &self,
        namespace: &str,
        reason: &str,
        count: i64,
        _now: DateTime<Utc>,
    ) -> Result<()> {
        self.dynamic_blacklist
            .lock()
            .unwrap()
            .insert(namespace.to_string(), (reason.to_string(), count));
        Ok(())
    }

    async fn known_model_ids(&self) -> Result<HashSet<String>> {
        Ok(self.models.lock().unwrap().keys().cloned().collect())
    }

    async fn model_last_modified(&self, model_id: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.models.lock().unwrap().get(model_id).copied())
    }

    async fn save_analysis(
        &self,
        candidate: &Candidate,
        tier: TrustTier,
        analysis: &AnalysisResult,
        params: &ParamEstimate,
    ) -> Result<()> {
        if self.fail_writes {
            anyhow::bail!("simulated analysis write failure");
        }
        self.models
            .lock()
            .unwrap()
            .insert(candidate.id.clone(), candidate.last_modified);
        self.analyses.lock().unwrap().push(SavedAnalysis {
            candidate_id: candidate.id.clone(),
            tier,
            analysis: analysis.clone(),
            params: *params,
        });
        Ok(())
    }

    async fn append_skip(&self, record: &SkipRecord, _at: DateTime<Utc>) -> Result<()> {
        if self.fail_writes {
            anyhow::bail!("simulated skip write failure");
        }
        self.skips.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Hub double
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct ScriptedHub {
    profiles: HashMap<String, ProfileLookup>,
    new_models: Vec<Candidate>,
    updated_models: Vec<Candidate>,
    profile_calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedHub {
    pub fn with_profile(mut self, namespace: &str, lookup: ProfileLookup) -> Self {
        self.profiles.insert(namespace.to_string(), lookup);
        self
    }

    pub fn with_new(mut self, candidate: Candidate) -> Self {
        self.new_models.push(candidate);
        self
    }

    pub fn with_updated(mut self, candidate: Candidate) -> Self {
        self.updated_models.push(candidate);
        self
    }

    pub fn profile_calls(&self, namespace: &str) -> usize {
        self.profile_calls
            .lock()
            .unwrap()
            .get(namespace)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl HubClient for ScriptedHub {
    async fn list_new(
        &self,
        _since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Candidate>, HubError> {
        Ok(self.new_models.iter().take(limit).cloned().collect())
    }

    async fn list_updated(
        &self,
        _since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Candidate>, HubError> {
        Ok(self.updated_models.iter().take(limit).cloned().collect())
    }

    async fn resolve_profile(&self, namespace: &str) -> Result<ProfileLookup, HubError> {
        *self
            .profile_calls
            .lock()
            .unwrap()
            .entry(namespace.to_string())
            .or_insert(0) += 1;
        Ok(self
            .profiles
            .get(namespace)
            .cloned()
            .unwrap_or(ProfileLookup::NotFound))
    }
}

// ----------------------------------------------------------------------------
// LLM double
// ----------------------------------------------------------------------------

/// Per-model scripted analyses; unscripted models fail as malformed output.
#[derive(Default)]
pub struct ScriptedLlm {
    analyses: HashMap<String, LlmAnalysis>,
    failures: HashMap<String, usize>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedLlm {
    pub fn with_analysis(mut self, model_id: &str, analysis: LlmAnalysis) -> Self {
        self.analyses.insert(model_id.to_string(), analysis);
        self
    }

    /// Fail the first `count` calls for this model with a transient error.
    pub fn failing_first(mut self, model_id: &str, count: usize) -> Self {
        self.failures.insert(model_id.to_string(), count);
        self
    }

    pub fn calls(&self, model_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(model_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl CompletionClient for ScriptedLlm {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<LlmAnalysis, LlmError> {
        let seen = {
            let mut calls = self.calls.lock().unwrap();
            let entry = calls.entry(request.model_id.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        if let Some(&count) = self.failures.get(request.model_id) {
            if seen <= count {
                return Err(LlmError::Timeout);
            }
        }
        self.analyses
            .get(request.model_id)
            .cloned()
            .ok_or_else(|| LlmError::Malformed("no scripted analysis".into()))
    }
}
