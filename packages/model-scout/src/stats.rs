use std::collections::{BTreeMap, HashMap};

use crate::types::{Confidence, SkipReason};

/// Read-only observer of one pipeline run. Counters only; never feeds back
/// into filtering decisions except through the end-of-run blacklist
/// promotion, which reads the per-uploader skip tallies.
#[derive(Debug, Default)]
pub struct RunStats {
    pub new_candidates: usize,
    pub updated_candidates: usize,
    /// Updated repos whose last-modified matched the stored row.
    pub noop_unchanged: usize,
    /// Candidates that cleared every filter and reached the LLM.
    pub admitted: usize,
    pub llm_succeeded: usize,
    pub llm_failed: usize,
    pub accepted_full_confidence: usize,
    pub accepted_reduced_confidence: usize,
    pub accepted_needs_review: usize,

    skips: BTreeMap<SkipReason, usize>,
    uploader_skips: HashMap<String, BTreeMap<SkipReason, usize>>,
    /// Tier2 namespaces surfaced for manual whitelist review, bounded.
    pub review_candidates: Vec<String>,
    review_max: usize,
}

impl RunStats {
    pub fn new(review_max: usize) -> Self {
        Self {
            review_max,
            ..Self::default()
        }
    }

    pub fn record_skip(&mut self, namespace: &str, reason: SkipReason) {
        *self.skips.entry(reason).or_insert(0) += 1;
        *self
            .uploader_skips
            .entry(namespace.to_string())
            .or_default()
            .entry(reason)
            .or_insert(0) += 1;
    }

    pub fn record_accepted(&mut self, confidence: Confidence, needs_review: bool) {
        match confidence {
            Confidence::High => self.accepted_full_confidence += 1,
            Confidence::Medium | Confidence::Low => self.accepted_reduced_confidence += 1,
        }
        if needs_review {
            self.accepted_needs_review += 1;
        }
    }

    pub fn record_review_candidate(&mut self, namespace: &str) {
        if self.review_candidates.len() < self.review_max
            && !self.review_candidates.iter().any(|ns| ns == namespace)
        {
            self.review_candidates.push(namespace.to_string());
        }
    }

    pub fn skip_count(&self, reason: SkipReason) -> usize {
        self.skips.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_skipped(&self) -> usize {
        self.skips.values().sum()
    }

    pub fn accepted(&self) -> usize {
        self.accepted_full_confidence + self.accepted_reduced_confidence
    }

    /// Namespaces whose dominant skip reason matches `reason` with at least
    /// `min_count` occurrences this run. Input to blacklist promotion.
    pub fn uploaders_dominated_by(&self, reason: SkipReason, min_count: usize) -> Vec<(String, usize)> {
        let mut out: Vec<(String, usize)> = self
            .uploader_skips
            .iter()
            .filter_map(|(ns, reasons)| {
                let hits = reasons.get(&reason).copied().unwrap_or(0);
                let max = reasons.values().copied().max().unwrap_or(0);
                (hits >= min_count && hits == max).then(|| (ns.clone(), hits))
            })
            .collect();
        out.sort();
        out
    }

    /// One-line run summary for logs and CLI output.
    pub fn summary_line(&self) -> String {
        let skips: Vec<String> = self
            .skips
            .iter()
            .map(|(reason, n)| format!("{reason}={n}"))
            .collect();
        format!(
            "seen={} (new={} updated={}) noop={} skipped={} [{}] admitted={} llm_ok={} llm_failed={} accepted={} (full={} reduced={} review={})",
            self.new_candidates + self.updated_candidates,
            self.new_candidates,
            self.updated_candidates,
            self.noop_unchanged,
            self.total_skipped(),
            skips.join(" "),
            self.admitted,
            self.llm_succeeded,
            self.llm_failed,
            self.accepted(),
            self.accepted_full_confidence,
            self.accepted_reduced_confidence,
            self.accepted_needs_review,
        )
    }
}
