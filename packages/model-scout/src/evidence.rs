use crate::types::{AnalysisResult, Confidence, EvidenceClaim, LlmAnalysis};

/// How one quoted span matched the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteMatch {
    /// Exact substring of the source.
    Verbatim,
    /// Found only after whitespace/punctuation normalization.
    Near,
    /// Not present in any form; the claim is unverified.
    Absent,
}

impl QuoteMatch {
    fn confidence(self) -> Confidence {
        match self {
            QuoteMatch::Verbatim => Confidence::High,
            QuoteMatch::Near => Confidence::Medium,
            QuoteMatch::Absent => Confidence::Low,
        }
    }
}

/// Whitespace-collapsed, lowercased form used for near-match containment.
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized form with punctuation removed as well, the loosest tier of
/// containment still accepted as a near match.
fn normalize_loose(text: &str) -> String {
    normalize(text)
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}

/// Containment check for one quote against the source README.
pub fn match_quote(quote: &str, source: &str) -> QuoteMatch {
    if quote.is_empty() || source.is_empty() {
        return QuoteMatch::Absent;
    }
    if source.contains(quote) {
        return QuoteMatch::Verbatim;
    }
    if normalize(source).contains(&normalize(quote)) {
        return QuoteMatch::Near;
    }
    let loose_quote = normalize_loose(quote);
    if !loose_quote.trim().is_empty() && normalize_loose(source).contains(&loose_quote) {
        return QuoteMatch::Near;
    }
    QuoteMatch::Absent
}

/// Validation of a full LLM analysis against its source README.
#[derive(Debug, Clone)]
pub struct EvidenceReport {
    pub verified: Vec<EvidenceClaim>,
    pub unverified: Vec<EvidenceClaim>,
    /// Minimum confidence observed across all claims.
    pub confidence: Confidence,
    /// No claim could be grounded at all; surface for manual review.
    pub needs_review: bool,
}

/// Check every claim's quote against the source. Overall confidence is
/// capped at the lowest level observed; a result with zero verifiable
/// quotes is flagged for review rather than silently trusted.
pub fn validate(analysis: &LlmAnalysis, source: &str) -> EvidenceReport {
    if analysis.evidence.is_empty() {
        return EvidenceReport {
            verified: vec![],
            unverified: vec![],
            confidence: Confidence::Low,
            needs_review: true,
        };
    }

    let mut verified = Vec::new();
    let mut unverified = Vec::new();
    let mut confidence = Confidence::High;

    for claim in &analysis.evidence {
        let outcome = match_quote(&claim.quote, source);
        confidence = confidence.min(outcome.confidence());
        match outcome {
            QuoteMatch::Verbatim | QuoteMatch::Near => verified.push(claim.clone()),
            QuoteMatch::Absent => unverified.push(claim.clone()),
        }
    }

    EvidenceReport {
        needs_review: verified.is_empty(),
        verified,
        unverified,
        confidence,
    }
}

/// Fold the evidence report into the persisted result. Only verified claims
/// survive into the result; the score stays clamped to its bounds.
pub fn finalize(analysis: LlmAnalysis, report: EvidenceReport) -> AnalysisResult {
    let specialist_score = analysis.clamped_score();
    AnalysisResult {
        category: analysis.category,
        base_model: analysis.base_model,
        delta: analysis.delta,
        specialist_score,
        evidence: report.verified,
        confidence: report.confidence,
        needs_review: report.needs_review,
    }
}
