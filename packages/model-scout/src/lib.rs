pub mod config;
pub mod dedup;
pub mod error;
pub mod evidence;
pub mod params;
pub mod pipeline;
pub mod policy;
pub mod quality;
pub mod scope;
pub mod stats;
pub mod storage;
pub mod traits;
pub mod trust;
pub mod types;
pub mod whitelist;

#[cfg(test)]
pub(crate) mod testutil;

// Re-exports for clean API
pub use config::{Config, QualityThresholds};
pub use error::{HubError, LlmError};
pub use pipeline::Pipeline;
pub use stats::RunStats;
pub use storage::{ScoutStorage, SqliteStorage};
pub use traits::{AnalysisRequest, CompletionClient, HubClient};
pub use types::{
    AnalysisResult, Candidate, Confidence, LlmAnalysis, PolicyVerdict, ProfileLookup, SkipReason,
    Stage, TrustTier,
};
pub use whitelist::DynamicWhitelistManager;
