//! Shared test doubles for the end-to-end pipeline scenarios.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use model_scout::types::{RepoFile, SafetyStatus};
use model_scout::{
    AnalysisRequest, Candidate, CompletionClient, HubClient, HubError, LlmAnalysis, LlmError,
    ProfileLookup,
};

pub struct CandidateSpec {
    pub id: String,
    pub readme: Option<String>,
    pub tags: Vec<&'static str>,
    pub pipeline_tag: Option<&'static str>,
    pub files: Vec<(&'static str, u64)>,
}

impl CandidateSpec {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            readme: Some(
                "This checkpoint specializes our base encoder for industrial \
                 defect parsing. Trained on inspection transcripts, it \
                 extracts structured fault codes from free maintenance text. \
                 Benchmarks at https://example.com/eval."
                    .to_string(),
            ),
            tags: vec!["extraction", "industrial", "fault-codes"],
            pipeline_tag: None,
            files: vec![("model.safetensors", 1_000_000)],
        }
    }

    pub fn readme(mut self, text: &str) -> Self {
        self.readme = Some(text.to_string());
        self
    }

    pub fn pipeline_tag(mut self, tag: &'static str) -> Self {
        self.pipeline_tag = Some(tag);
        self
    }

    pub fn build(self) -> Candidate {
        let (namespace, name) = self.id.split_once('/').expect("id must be namespace/name");
        let (namespace, name) = (namespace.to_string(), name.to_string());
        Candidate {
            id: self.id,
            namespace,
            name,
            tags: self.tags.iter().map(|t| t.to_string()).collect(),
            pipeline_tag: self.pipeline_tag.map(|t| t.to_string()),
            card_data: serde_json::Value::Null,
            readme: self.readme,
            files: self
                .files
                .into_iter()
                .map(|(path, size)| RepoFile {
                    path: path.to_string(),
                    size,
                    scan_status: SafetyStatus::Unknown,
                })
                .collect(),
            created_at: Utc::now(),
            last_modified: Utc::now(),
            safety: SafetyStatus::Safe,
            safetensors_total_params: None,
        }
    }
}

#[derive(Default)]
pub struct ScenarioHub {
    pub new_models: Vec<Candidate>,
    pub profiles: HashMap<String, ProfileLookup>,
    pub seen_since: Mutex<Vec<DateTime<Utc>>>,
}

impl ScenarioHub {
    pub fn with_new(mut self, candidate: Candidate) -> Self {
        self.new_models.push(candidate);
        self
    }

    pub fn with_profile(mut self, namespace: &str, lookup: ProfileLookup) -> Self {
        self.profiles.insert(namespace.to_string(), lookup);
        self
    }
}

#[async_trait]
impl HubClient for ScenarioHub {
    async fn list_new(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Candidate>, HubError> {
        self.seen_since.lock().unwrap().push(since);
        Ok(self.new_models.iter().take(limit).cloned().collect())
    }

    async fn list_updated(
        &self,
        since: DateTime<Utc>,
        _limit: usize,
    ) -> Result<Vec<Candidate>, HubError> {
        self.seen_since.lock().unwrap().push(since);
        Ok(vec![])
    }

    async fn resolve_profile(&self, namespace: &str) -> Result<ProfileLookup, HubError> {
        Ok(self
            .profiles
            .get(namespace)
            .cloned()
            .unwrap_or(ProfileLookup::NotFound))
    }
}

#[derive(Default)]
pub struct ScenarioLlm {
    pub analyses: HashMap<String, LlmAnalysis>,
    pub calls: Mutex<Vec<String>>,
}

impl ScenarioLlm {
    pub fn with_analysis(mut self, model_id: &str, analysis: LlmAnalysis) -> Self {
        self.analyses.insert(model_id.to_string(), analysis);
        self
    }

    pub fn analyzed(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScenarioLlm {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<LlmAnalysis, LlmError> {
        self.calls.lock().unwrap().push(request.model_id.to_string());
        self.analyses
            .get(request.model_id)
            .cloned()
            .ok_or_else(|| LlmError::Malformed("no scripted analysis".into()))
    }
}
