use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};

use crate::config::Config;
use crate::dedup::DuplicateSuppressor;
use crate::error::{HubError, LlmError};
use crate::evidence;
use crate::policy::NamespacePolicy;
use crate::quality::check_quality;
use crate::scope::check_scope;
use crate::stats::RunStats;
use crate::storage::ScoutStorage;
use crate::traits::{AnalysisRequest, CompletionClient, HubClient};
use crate::trust::TrustClassifier;
use crate::types::{Candidate, LlmAnalysis, PolicyVerdict, SkipReason, SkipRecord};
use crate::whitelist::DynamicWhitelistManager;

/// Per-run mutable state shared by the stages. Built fresh for every run;
/// nothing in here outlives it except through storage writes.
struct RunContext {
    policy: NamespacePolicy,
    trust: TrustClassifier,
    dedup: DuplicateSuppressor,
    stats: RunStats,
    dry_run: bool,
}

/// The candidate filtering and analysis pipeline. Stages run strictly in
/// order; the cheapest checks come first so most candidates never reach
/// the LLM.
pub struct Pipeline<'a> {
    config: &'a Config,
    hub: &'a dyn HubClient,
    llm: &'a dyn CompletionClient,
    storage: &'a dyn ScoutStorage,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        hub: &'a dyn HubClient,
        llm: &'a dyn CompletionClient,
        storage: &'a dyn ScoutStorage,
    ) -> Self {
        Self {
            config,
            hub,
            llm,
            storage,
        }
    }

    /// Execute one discovery run. A dry run traverses every stage but never
    /// writes to storage, including the run timestamp.
    pub async fn run(&self, limit_per_source: usize, dry_run: bool) -> Result<RunStats> {
        let run_started = Utc::now();
        let since = match self.storage.last_run().await? {
            Some(ts) => ts,
            None => run_started - Duration::hours(self.config.first_run_window_hours),
        };
        tracing::info!(since = %since, limit = limit_per_source, dry_run, "starting run");

        let whitelist = DynamicWhitelistManager::new(self.config);
        let mut ctx = RunContext {
            policy: NamespacePolicy::new(
                self.config,
                self.storage.dynamic_whitelist().await?,
                self.storage.dynamic_blacklist().await?,
            ),
            trust: TrustClassifier::new(self.config),
            dedup: DuplicateSuppressor::new(self.config.duplicate_block_limit),
            stats: RunStats::new(self.config.tier2_review_max),
            dry_run,
        };

        let (candidates, new_count, updated_count) = self.fetch(since, limit_per_source).await?;
        ctx.stats.new_candidates = new_count;
        ctx.stats.updated_candidates = updated_count;

        for candidate in candidates {
            // Hub and LLM failures are absorbed inside `process` as
            // per-candidate outcomes; any error reaching this point came
            // from the persistence layer and aborts the run before the
            // completion timestamp is committed.
            self.process(&candidate, &whitelist, &mut ctx)
                .await
                .with_context(|| format!("Storage failure while processing '{}'", candidate.id))?;
        }

        if !dry_run {
            let promoted = whitelist
                .promote_blacklist(&ctx.stats, &ctx.policy, self.storage)
                .await?;
            if !promoted.is_empty() {
                tracing::info!(namespaces = ?promoted, "promoted uploaders to the dynamic blacklist");
            }
            // Written last so a crashed run is re-fetched in full next time.
            self.storage.set_last_run(run_started).await?;
        }

        tracing::info!(summary = %ctx.stats.summary_line(), "run complete");
        Ok(ctx.stats)
    }

    /// Fetch new and updated repos since `since`, deduplicated by id with
    /// the new listing taking precedence.
    async fn fetch(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<(Vec<Candidate>, usize, usize)> {
        let new = self
            .fetch_with_retry(|| self.hub.list_new(since, limit))
            .await?;
        let updated = self
            .fetch_with_retry(|| self.hub.list_updated(since, limit))
            .await?;

        let mut seen: std::collections::HashSet<String> =
            new.iter().map(|c| c.id.clone()).collect();
        let new_count = new.len();
        let mut merged = new;
        let mut updated_count = 0;
        for candidate in updated {
            if seen.insert(candidate.id.clone()) {
                updated_count += 1;
                merged.push(candidate);
            }
        }
        Ok((merged, new_count, updated_count))
    }

    async fn fetch_with_retry<F, Fut>(&self, mut call: F) -> Result<Vec<Candidate>>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<Candidate>, HubError>>,
    {
        let attempts = self.config.max_retries.max(1);
        let mut last_err = None;
        for attempt in 0..attempts {
            match call().await {
                Ok(list) => return Ok(list),
                Err(e) if e.is_transient() && attempt + 1 < attempts => {
                    tracing::warn!(attempt, error = %e, "hub listing failed, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(last_err.unwrap_or(HubError::Timeout).into())
    }

    async fn process(
        &self,
        candidate: &Candidate,
        whitelist: &DynamicWhitelistManager,
        ctx: &mut RunContext,
    ) -> Result<()> {
        // Delta check: an updated repo whose stored row already carries this
        // last-modified has nothing new to analyze.
        if let Some(stored) = self.storage.model_last_modified(&candidate.id).await? {
            if stored >= candidate.last_modified {
                ctx.stats.noop_unchanged += 1;
                tracing::debug!(model = %candidate.id, "unchanged since last analysis");
                return Ok(());
            }
        }

        let classification = ctx
            .trust
            .classify(&candidate.namespace, self.hub, self.storage, ctx.dry_run)
            .await?;
        whitelist
            .record_observation(
                &candidate.namespace,
                classification.tier,
                &mut ctx.policy,
                self.storage,
                &mut ctx.stats,
                ctx.dry_run,
            )
            .await?;

        let verdict = ctx.policy.verdict(&candidate.namespace);
        if verdict == PolicyVerdict::Blocked {
            return self
                .skip(candidate, SkipReason::BlacklistedNamespace, None, ctx)
                .await;
        }

        let scope = check_scope(
            candidate,
            self.config.max_total_params_b,
            self.config.bytes_per_param,
        );
        if let Some(reason) = scope.rejection {
            return self.skip(candidate, reason, None, ctx).await;
        }

        let quality = check_quality(
            candidate,
            classification.tier,
            verdict,
            &self.config.quality,
        );
        if let Some(reason) = quality.rejection {
            let detail = format!("score {} < {}", quality.score, quality.threshold);
            return self.skip(candidate, reason, Some(detail), ctx).await;
        }

        if let Some(reason) = ctx.dedup.check(candidate) {
            return self.skip(candidate, reason, None, ctx).await;
        }

        ctx.stats.admitted += 1;
        tracing::info!(
            model = %candidate.id,
            tier = ?classification.tier,
            score = quality.score,
            "admitted for analysis"
        );

        let analysis = match self.analyze_with_retry(candidate).await {
            Ok(analysis) => analysis,
            Err(e) => {
                ctx.stats.llm_failed += 1;
                // Not persisted as analyzed, so the candidate is re-eligible
                // on its next discovery.
                return self
                    .skip(candidate, SkipReason::LlmFailure, Some(e.to_string()), ctx)
                    .await;
            }
        };
        ctx.stats.llm_succeeded += 1;

        let report = evidence::validate(&analysis, candidate.readme_text());
        let result = evidence::finalize(analysis, report);

        if !ctx.dry_run {
            self.storage
                .save_analysis(candidate, classification.tier, &result, &scope.params)
                .await?;
        }
        ctx.stats
            .record_accepted(result.confidence, result.needs_review);
        tracing::info!(
            model = %candidate.id,
            score = result.specialist_score,
            confidence = result.confidence.as_str(),
            needs_review = result.needs_review,
            "analysis accepted"
        );
        Ok(())
    }

    async fn analyze_with_retry(&self, candidate: &Candidate) -> Result<LlmAnalysis, LlmError> {
        let request = AnalysisRequest {
            model_id: &candidate.id,
            readme: candidate.readme_text(),
            tags: &candidate.tags,
            card_data: &candidate.card_data,
        };
        let attempts = self.config.max_retries.max(1);
        let mut last_err = None;
        for attempt in 0..attempts {
            match self.llm.analyze(request.clone()).await {
                Ok(analysis) => return Ok(analysis),
                Err(e) if e.is_transient() && attempt + 1 < attempts => {
                    tracing::warn!(model = %candidate.id, attempt, error = %e, "analysis failed, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(LlmError::Timeout))
    }

    async fn skip(
        &self,
        candidate: &Candidate,
        reason: SkipReason,
        detail: Option<String>,
        ctx: &mut RunContext,
    ) -> Result<()> {
        tracing::debug!(model = %candidate.id, reason = %reason, "skipped");
        ctx.stats.record_skip(&candidate.namespace, reason);
        if !ctx.dry_run {
            let record = SkipRecord {
                model_id: candidate.id.clone(),
                namespace: candidate.namespace.clone(),
                stage: reason.stage(),
                reason,
                detail,
            };
            self.storage.append_skip(&record, Utc::now()).await?;
        }
        Ok(())
    }
}
