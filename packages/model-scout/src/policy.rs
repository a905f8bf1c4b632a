use std::collections::BTreeSet;

use crate::config::Config;
use crate::types::PolicyVerdict;

/// Reduce any of the accepted namespace spellings (bare name, repo id, hub
/// URL) to a canonical lowercase namespace.
pub fn normalize_namespace(raw: &str) -> String {
    let mut s = raw.trim().to_lowercase();
    if let Some(idx) = s.find("huggingface.co/") {
        s = s[idx + "huggingface.co/".len()..]
            .trim_matches('/')
            .to_string();
    }
    if let Some((ns, _)) = s.split_once('/') {
        s = ns.trim().to_string();
    }
    s
}

/// Whitelist/blacklist precedence rules. Blacklist membership is absolute
/// and checked first, regardless of any whitelist entry for the same
/// namespace.
#[derive(Debug, Clone)]
pub struct NamespacePolicy {
    static_whitelist: BTreeSet<String>,
    static_blacklist: BTreeSet<String>,
    dynamic_whitelist: BTreeSet<String>,
    dynamic_blacklist: BTreeSet<String>,
}

impl NamespacePolicy {
    pub fn new(
        config: &Config,
        dynamic_whitelist: BTreeSet<String>,
        dynamic_blacklist: BTreeSet<String>,
    ) -> Self {
        Self {
            static_whitelist: config
                .static_whitelist
                .iter()
                .map(|ns| normalize_namespace(ns))
                .collect(),
            static_blacklist: config
                .static_blacklist
                .iter()
                .map(|ns| normalize_namespace(ns))
                .collect(),
            dynamic_whitelist: dynamic_whitelist
                .iter()
                .map(|ns| normalize_namespace(ns))
                .collect(),
            dynamic_blacklist: dynamic_blacklist
                .iter()
                .map(|ns| normalize_namespace(ns))
                .collect(),
        }
    }

    pub fn verdict(&self, namespace: &str) -> PolicyVerdict {
        let key = normalize_namespace(namespace);
        if self.static_blacklist.contains(&key) || self.dynamic_blacklist.contains(&key) {
            return PolicyVerdict::Blocked;
        }
        if self.static_whitelist.contains(&key) || self.dynamic_whitelist.contains(&key) {
            return PolicyVerdict::FastPass;
        }
        PolicyVerdict::Normal
    }

    pub fn is_blacklisted(&self, namespace: &str) -> bool {
        self.verdict(namespace) == PolicyVerdict::Blocked
    }

    pub fn is_statically_whitelisted(&self, namespace: &str) -> bool {
        self.static_whitelist.contains(&normalize_namespace(namespace))
    }

    /// Mirror a whitelist addition made during this run, so later candidates
    /// see it without a storage round-trip.
    pub fn note_dynamic_whitelist(&mut self, namespace: &str) {
        self.dynamic_whitelist.insert(normalize_namespace(namespace));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(whitelist: &[&str], blacklist: &[&str]) -> NamespacePolicy {
        let mut config = Config::default();
        config.static_whitelist = whitelist.iter().map(|s| s.to_string()).collect();
        config.static_blacklist = blacklist.iter().map(|s| s.to_string()).collect();
        NamespacePolicy::new(&config, BTreeSet::new(), BTreeSet::new())
    }

    #[test]
    fn normalization_handles_urls_and_repo_ids() {
        assert_eq!(normalize_namespace("Acme"), "acme");
        assert_eq!(normalize_namespace("acme/widget-7b"), "acme");
        assert_eq!(
            normalize_namespace("https://huggingface.co/Acme/widget-7b"),
            "acme"
        );
        assert_eq!(normalize_namespace("  acme  "), "acme");
    }

    #[test]
    fn blacklist_wins_over_conflicting_whitelist() {
        let p = policy(&["conflicted"], &["conflicted"]);
        assert_eq!(p.verdict("conflicted"), PolicyVerdict::Blocked);
    }

    #[test]
    fn dynamic_blacklist_wins_over_dynamic_whitelist() {
        let mut config = Config::default();
        config.static_whitelist.clear();
        config.static_blacklist.clear();
        let p = NamespacePolicy::new(
            &config,
            ["conflicted".to_string()].into_iter().collect(),
            ["conflicted".to_string()].into_iter().collect(),
        );
        assert_eq!(p.verdict("conflicted"), PolicyVerdict::Blocked);
    }

    #[test]
    fn whitelist_grants_fast_pass() {
        let p = policy(&["trusted-org"], &[]);
        assert_eq!(p.verdict("Trusted-Org"), PolicyVerdict::FastPass);
        assert_eq!(p.verdict("trusted-org/some-model"), PolicyVerdict::FastPass);
    }

    #[test]
    fn unknown_namespace_is_normal() {
        let p = policy(&[], &[]);
        assert_eq!(p.verdict("someone"), PolicyVerdict::Normal);
    }

    #[test]
    fn run_scoped_whitelist_addition_is_visible() {
        let mut p = policy(&[], &[]);
        assert_eq!(p.verdict("fresh-org"), PolicyVerdict::Normal);
        p.note_dynamic_whitelist("Fresh-Org");
        assert_eq!(p.verdict("fresh-org"), PolicyVerdict::FastPass);
    }
}
