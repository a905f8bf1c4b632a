use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{HubError, LlmError};
use crate::types::{Candidate, LlmAnalysis, ProfileLookup};

// ============================================================================
// HUB CLIENT: discovery connector (network access)
// ============================================================================

#[async_trait]
pub trait HubClient: Send + Sync {
    /// List repos created after `since`, newest first, at most `limit`.
    async fn list_new(&self, since: DateTime<Utc>, limit: usize)
        -> Result<Vec<Candidate>, HubError>;

    /// List repos modified after `since`, at most `limit`.
    async fn list_updated(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Candidate>, HubError>;

    /// Resolve a namespace to an org/user profile.
    async fn resolve_profile(&self, namespace: &str) -> Result<ProfileLookup, HubError>;
}

// ============================================================================
// COMPLETION CLIENT: LLM analysis (network access)
// ============================================================================

/// Bounded-length analysis request. Prompt text itself is the client's
/// concern.
#[derive(Debug, Clone)]
pub struct AnalysisRequest<'a> {
    pub model_id: &'a str,
    pub readme: &'a str,
    pub tags: &'a [String],
    pub card_data: &'a serde_json::Value,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<LlmAnalysis, LlmError>;
}
