use crate::config::QualityThresholds;
use crate::types::{Candidate, PolicyVerdict, SkipReason, TrustTier};

const BOILERPLATE_MARKERS: &[&str] = &[
    "more information needed",
    "[more information needed]",
    "this is the model card of a \u{1F917} transformers model",
    "automatically generated",
];

const UNSLOTH_TEMPLATE_MARKERS: &[&str] = &[
    "trained 2x faster with unsloth",
    "uploaded model",
    "finetuned from model",
];

const QUANT_BASE_MARKERS: &[&str] = &[
    "bnb-4bit", "bnb-8bit", "gguf", "gptq", "awq", "int4", "int8", "4bit", "8bit", "exl2",
];

/// How the quality gate judged one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityOutcome {
    pub score: u32,
    pub threshold: u32,
    pub rejection: Option<SkipReason>,
}

/// Effective quality threshold, kept as a data lookup rather than branch
/// logic. FastPass (whitelisted) and Tier3 orgs get the relaxed minimum.
pub fn threshold_for(
    tier: TrustTier,
    verdict: PolicyVerdict,
    thresholds: &QualityThresholds,
) -> u32 {
    match (verdict, tier) {
        (PolicyVerdict::FastPass, _) => thresholds.relaxed,
        (_, TrustTier::Tier3) => thresholds.relaxed,
        (_, TrustTier::Tier2) => thresholds.intermediate,
        (_, TrustTier::Tier1) => thresholds.strict,
    }
}

/// Information-density score over front-matter richness, tag count and
/// README substance. One point per signal.
pub fn info_score(candidate: &Candidate) -> u32 {
    let mut score = 0;
    let readme = strip_boilerplate(candidate.readme_text());
    let lower = readme.to_lowercase();

    if readme.chars().count() > 500 {
        score += 1;
    }
    if readme.chars().count() > 2000 {
        score += 1;
    }

    let card = candidate.card_data.as_object();
    let has_key = |key: &str| card.map(|m| m.contains_key(key)).unwrap_or(false);
    if has_key("license") {
        score += 1;
    }
    if has_key("base_model") || lower.contains("base_model") {
        score += 1;
    }
    if has_key("datasets") || lower.contains("dataset") {
        score += 1;
    }
    if candidate.tags.len() > 2 {
        score += 1;
    }
    if lower.contains("http") {
        score += 1;
    }

    score
}

/// Text with known placeholder sections removed, so boilerplate length
/// cannot masquerade as substance.
fn strip_boilerplate(readme: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for line in readme.lines() {
        let lower = line.to_lowercase();
        if BOILERPLATE_MARKERS.iter().any(|m| lower.contains(m)) {
            continue;
        }
        kept.push(line);
    }
    kept.join("\n")
}

fn is_stub_readme(readme: &str) -> bool {
    let t = strip_boilerplate(readme);
    let t = t.trim();
    t.chars().count() < 50
}

/// Tier1-only template filters: mass-produced finetunes the strict tier
/// does not get to spend analysis budget on.
fn tier1_template_rejection(candidate: &Candidate) -> Option<SkipReason> {
    let tags = candidate.tag_set();
    let readme = candidate.readme_text().to_lowercase();

    if tags.contains("roleplay") || tags.contains("rp") {
        return Some(SkipReason::RoleplayContent);
    }
    // Quant-base check runs before the generic template markers, so the
    // more specific reason wins when both would match.
    if let Some(base) = finetuned_from_line(&readme) {
        if QUANT_BASE_MARKERS.iter().any(|m| base.contains(m)) {
            return Some(SkipReason::QuantBaseFinetune);
        }
    }
    if UNSLOTH_TEMPLATE_MARKERS.iter().any(|m| readme.contains(m))
        || (tags.contains("unsloth") && readme.contains("finetuned from"))
    {
        return Some(SkipReason::TemplateFinetune);
    }
    None
}

fn finetuned_from_line(readme: &str) -> Option<String> {
    for line in readme.lines() {
        if let Some(rest) = line.split("finetuned from model").nth(1) {
            let base = rest.trim_start_matches([':', ' ']).trim();
            if !base.is_empty() {
                return Some(base.to_string());
            }
        }
    }
    None
}

/// Quality gate: documentation richness against the tier-dependent minimum.
/// This is deliberately the last stage before the LLM call.
pub fn check_quality(
    candidate: &Candidate,
    tier: TrustTier,
    verdict: PolicyVerdict,
    thresholds: &QualityThresholds,
) -> QualityOutcome {
    let threshold = threshold_for(tier, verdict, thresholds);
    let score = info_score(candidate);

    if candidate.readme.is_none() {
        return QualityOutcome {
            score,
            threshold,
            rejection: Some(SkipReason::NoReadme),
        };
    }
    if is_stub_readme(candidate.readme_text()) {
        return QualityOutcome {
            score,
            threshold,
            rejection: Some(SkipReason::StubReadme),
        };
    }

    if verdict != PolicyVerdict::FastPass && tier == TrustTier::Tier1 {
        if let Some(reason) = tier1_template_rejection(candidate) {
            return QualityOutcome {
                score,
                threshold,
                rejection: Some(reason),
            };
        }
    }

    let rejection = if score < threshold {
        Some(SkipReason::InsufficientDocumentation)
    } else {
        None
    };
    QualityOutcome {
        score,
        threshold,
        rejection,
    }
}
