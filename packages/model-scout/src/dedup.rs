use std::collections::HashMap;

use crate::types::{Candidate, RepoSignature, SkipReason};

/// Case-insensitive, separator-normalized model name used as the duplicate
/// counter key.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == '_' || c == '.' { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Per-run guard against one namespace flooding a run with near-identical
/// repackages of the same model name. Counters live only for the run.
pub struct DuplicateSuppressor {
    block_limit: u32,
    counts: HashMap<String, u32>,
    signatures: HashMap<RepoSignature, String>,
}

impl DuplicateSuppressor {
    pub fn new(block_limit: u32) -> Self {
        Self {
            block_limit: block_limit.max(1),
            counts: HashMap::new(),
            signatures: HashMap::new(),
        }
    }

    /// Admission attempt for one candidate. Increments the counter for its
    /// normalized name; the occurrence that reaches the block limit and all
    /// later ones are rejected.
    pub fn check(&mut self, candidate: &Candidate) -> Option<SkipReason> {
        let signature = RepoSignature::of(candidate);
        match self.signatures.get(&signature) {
            Some(original) if original != &candidate.id => {
                return Some(SkipReason::DuplicateSignature);
            }
            _ => {
                self.signatures.insert(signature, candidate.id.clone());
            }
        }

        let key = normalize_name(&candidate.name);
        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        if *count >= self.block_limit {
            return Some(SkipReason::DuplicateLimit);
        }
        None
    }
}
