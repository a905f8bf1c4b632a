use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// ENUMS (type-safe states)
// ============================================================================

/// Trust classification of an author namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    /// Regular account, no signals either way.
    Tier1,
    /// Strong user: high follower count or pro status.
    Tier2,
    /// Organization account.
    Tier3,
}

impl TrustTier {
    pub fn as_i64(self) -> i64 {
        match self {
            TrustTier::Tier1 => 1,
            TrustTier::Tier2 => 2,
            TrustTier::Tier3 => 3,
        }
    }
}

/// Outcome of the namespace policy check. First match wins, blacklist first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyVerdict {
    /// Blacklisted (static or dynamic). Unconditional, beats whitelist.
    Blocked,
    /// Whitelisted (static or dynamic). Relaxes the quality gate threshold.
    FastPass,
    Normal,
}

/// What kind of account a namespace resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorKind {
    Org,
    User,
}

/// Result of resolving a namespace against the hub's profile API.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileLookup {
    Organization,
    User { followers: i64, is_pro: bool },
    /// Freshly created or deleted account. Deliberately never cached so the
    /// namespace is re-resolved on its next occurrence.
    NotFound,
}

/// Repo-level safety scan status as reported by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyStatus {
    Safe,
    Flagged,
    Unknown,
}

/// Pipeline stage at which a candidate was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Trust,
    Policy,
    Scope,
    Quality,
    Duplicate,
    Analysis,
    Evidence,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Trust => "trust",
            Stage::Policy => "policy",
            Stage::Scope => "scope",
            Stage::Quality => "quality",
            Stage::Duplicate => "duplicate",
            Stage::Analysis => "analysis",
            Stage::Evidence => "evidence",
        }
    }
}

/// Machine-readable rejection reason codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    BlacklistedNamespace,
    UnsafeWeights,
    GenerativeVisual,
    RoboticsPolicy,
    ExportConversion,
    AdultContent,
    MergeModel,
    ParamsTooLarge,
    NoReadme,
    StubReadme,
    RoleplayContent,
    TemplateFinetune,
    QuantBaseFinetune,
    InsufficientDocumentation,
    DuplicateLimit,
    DuplicateSignature,
    LlmFailure,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::BlacklistedNamespace => "blacklisted-namespace",
            SkipReason::UnsafeWeights => "unsafe-weights",
            SkipReason::GenerativeVisual => "generative-visual",
            SkipReason::RoboticsPolicy => "robotics-policy",
            SkipReason::ExportConversion => "export-conversion",
            SkipReason::AdultContent => "adult-content",
            SkipReason::MergeModel => "merge-model",
            SkipReason::ParamsTooLarge => "params-too-large",
            SkipReason::NoReadme => "no-readme",
            SkipReason::StubReadme => "stub-readme",
            SkipReason::RoleplayContent => "roleplay-content",
            SkipReason::TemplateFinetune => "template-finetune",
            SkipReason::QuantBaseFinetune => "quant-base-finetune",
            SkipReason::InsufficientDocumentation => "insufficient-documentation",
            SkipReason::DuplicateLimit => "duplicate-limit",
            SkipReason::DuplicateSignature => "duplicate-signature",
            SkipReason::LlmFailure => "llm-failure",
        }
    }

    /// Stage this reason belongs to, for skip-record bookkeeping.
    pub fn stage(self) -> Stage {
        match self {
            SkipReason::BlacklistedNamespace => Stage::Policy,
            SkipReason::UnsafeWeights
            | SkipReason::GenerativeVisual
            | SkipReason::RoboticsPolicy
            | SkipReason::ExportConversion
            | SkipReason::AdultContent
            | SkipReason::MergeModel
            | SkipReason::ParamsTooLarge
            | SkipReason::NoReadme
            | SkipReason::StubReadme => Stage::Scope,
            SkipReason::RoleplayContent
            | SkipReason::TemplateFinetune
            | SkipReason::QuantBaseFinetune
            | SkipReason::InsufficientDocumentation => Stage::Quality,
            SkipReason::DuplicateLimit | SkipReason::DuplicateSignature => Stage::Duplicate,
            SkipReason::LlmFailure => Stage::Analysis,
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence in an accepted analysis, derived from evidence validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

/// Category the LLM assigned to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCategory {
    Base,
    Adapter,
    Finetune,
}

/// How a dynamic whitelist entry got there. The static whitelist is
/// compiled in and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WhitelistOrigin {
    /// Auto-added after a Tier3 organization observation.
    Tier3Org,
    /// Added through the CLI.
    Manual,
}

impl WhitelistOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            WhitelistOrigin::Tier3Org => "tier3-org",
            WhitelistOrigin::Manual => "manual",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "tier3-org" => WhitelistOrigin::Tier3Org,
            _ => WhitelistOrigin::Manual,
        }
    }
}

// ============================================================================
// CORE TYPES
// ============================================================================

/// One file in a repo manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoFile {
    pub path: String,
    pub size: u64,
    #[serde(default = "default_scan_status")]
    pub scan_status: SafetyStatus,
}

fn default_scan_status() -> SafetyStatus {
    SafetyStatus::Unknown
}

/// Immutable snapshot of one discovered model repository. Created per fetch,
/// never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Full repo id, `namespace/name`.
    pub id: String,
    pub namespace: String,
    pub name: String,
    pub tags: Vec<String>,
    pub pipeline_tag: Option<String>,
    /// Structured front-matter fields (license, base_model, datasets, ...)
    /// as the hub delivers them.
    pub card_data: serde_json::Value,
    pub readme: Option<String>,
    pub files: Vec<RepoFile>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub safety: SafetyStatus,
    /// Exact total parameter count from weight-file metadata, when the hub
    /// exposes it.
    pub safetensors_total_params: Option<u64>,
}

impl Candidate {
    pub fn tag_set(&self) -> std::collections::HashSet<String> {
        self.tags.iter().map(|t| t.to_lowercase()).collect()
    }

    pub fn readme_text(&self) -> &str {
        self.readme.as_deref().unwrap_or("")
    }
}

/// One claim the LLM made, paired with its supporting quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceClaim {
    pub claim: String,
    pub quote: String,
}

/// Structured LLM output, before evidence validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAnalysis {
    pub category: ModelCategory,
    pub base_model: Option<String>,
    pub delta: String,
    pub specialist_score: i64,
    #[serde(default)]
    pub evidence: Vec<EvidenceClaim>,
}

impl LlmAnalysis {
    /// Score bounded to 1..=10 regardless of what the LLM asserted.
    pub fn clamped_score(&self) -> i64 {
        self.specialist_score.clamp(1, 10)
    }
}

/// Validated analysis as persisted and reported. Confidence comes from the
/// evidence validator, not from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub category: ModelCategory,
    pub base_model: Option<String>,
    pub delta: String,
    pub specialist_score: i64,
    pub evidence: Vec<EvidenceClaim>,
    pub confidence: Confidence,
    pub needs_review: bool,
}

/// Append-only record of one rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipRecord {
    pub model_id: String,
    pub namespace: String,
    pub stage: Stage,
    pub reason: SkipReason,
    pub detail: Option<String>,
}

/// Cached author resolution. Never written for a NotFound lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorCacheEntry {
    pub namespace: String,
    pub kind: AuthorKind,
    pub followers: i64,
    pub is_pro: bool,
    pub checked_at: DateTime<Utc>,
}

/// Persisted whitelist membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub namespace: String,
    pub origin: WhitelistOrigin,
    pub last_seen: DateTime<Utc>,
}

// ============================================================================
// CONTENT SIGNATURE
// ============================================================================

/// SHA-256 signature over normalized README text plus the sorted non-README
/// file paths, used to spot repo clones inside one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoSignature(pub String);

impl RepoSignature {
    pub fn of(candidate: &Candidate) -> Self {
        let text: String = candidate
            .readme_text()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let cut = text
            .char_indices()
            .nth(20_000)
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        let text = &text[..cut];

        let mut paths: Vec<String> = candidate
            .files
            .iter()
            .map(|f| f.path.trim().to_lowercase())
            .filter(|p| !p.is_empty() && !p.ends_with("readme.md") && !p.ends_with("modelcard.md"))
            .collect();
        paths.sort();
        paths.dedup();
        paths.truncate(80);

        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(b"\n---\n");
        hasher.update(paths.join("|").as_bytes());
        Self(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(readme: &str, files: &[&str]) -> Candidate {
        Candidate {
            id: "acme/widget-7b".into(),
            namespace: "acme".into(),
            name: "widget-7b".into(),
            tags: vec![],
            pipeline_tag: None,
            card_data: serde_json::Value::Null,
            readme: Some(readme.to_string()),
            files: files
                .iter()
                .map(|p| RepoFile {
                    path: p.to_string(),
                    size: 10,
                    scan_status: SafetyStatus::Unknown,
                })
                .collect(),
            created_at: Utc::now(),
            last_modified: Utc::now(),
            safety: SafetyStatus::Safe,
            safetensors_total_params: None,
        }
    }

    #[test]
    fn signature_ignores_whitespace_and_readme_file() {
        let a = candidate("A  fine\ttuned model", &["model.safetensors", "README.md"]);
        let b = candidate("a fine tuned model", &["model.safetensors"]);
        assert_eq!(RepoSignature::of(&a), RepoSignature::of(&b));
    }

    #[test]
    fn signature_differs_on_file_layout() {
        let a = candidate("same text", &["model.safetensors"]);
        let b = candidate("same text", &["model.safetensors", "tokenizer.json"]);
        assert_ne!(RepoSignature::of(&a), RepoSignature::of(&b));
    }

    #[test]
    fn score_is_clamped() {
        let analysis = LlmAnalysis {
            category: ModelCategory::Finetune,
            base_model: None,
            delta: String::new(),
            specialist_score: 42,
            evidence: vec![],
        };
        assert_eq!(analysis.clamped_score(), 10);
    }
}
