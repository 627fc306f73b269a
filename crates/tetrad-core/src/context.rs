use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CONTEXT;

/// A named scoring profile: keyword → signed per-axis deltas
/// [love, justice, power, wisdom]. Keys may be single tokens or
/// space-joined bigram phrases.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextProfile {
    pub name: String,
    pub keywords: HashMap<String, [f64; 4]>,
}

impl ContextProfile {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            keywords: HashMap::new(),
        }
    }

    fn keyword(mut self, word: &str, deltas: [f64; 4]) -> Self {
        self.keywords.insert(word.to_string(), deltas);
        self
    }
}

/// Registry of context profiles. Unknown names resolve to the default
/// profile rather than failing — context lookup never raises.
#[derive(Clone, Debug)]
pub struct ContextRegistry {
    profiles: HashMap<String, ContextProfile>,
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ContextRegistry {
    /// Registry with the built-in profiles: general, biblical, ethical,
    /// governance.
    pub fn builtin() -> Self {
        let mut registry = Self {
            profiles: HashMap::new(),
        };
        registry.register(general_profile());
        registry.register(biblical_profile());
        registry.register(ethical_profile());
        registry.register(governance_profile());
        registry
    }

    /// Empty registry, for callers that supply every profile themselves.
    pub fn empty() -> Self {
        Self {
            profiles: HashMap::new(),
        }
    }

    /// Add or replace a profile under its own name.
    pub fn register(&mut self, profile: ContextProfile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    pub fn get(&self, name: &str) -> Option<&ContextProfile> {
        self.profiles.get(name)
    }

    /// Resolve a context name, falling back to the default profile for
    /// unknown names. Panics only if the default itself is missing, which
    /// cannot happen for a builtin registry.
    pub fn resolve(&self, name: &str) -> Option<&ContextProfile> {
        self.profiles
            .get(name)
            .or_else(|| self.profiles.get(DEFAULT_CONTEXT))
            .or_else(|| self.profiles.values().next())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Per-operation axis multipliers for the contextual weighting pass.
/// A fixed lookup table, not computed logic. Unknown names yield None
/// and the caller treats the pass as identity.
pub fn operation_weights(operation: &str) -> Option<[f64; 4]> {
    match operation {
        "creation" => Some([1.1, 1.0, 1.25, 1.05]),
        "judgment" => Some([0.9, 1.3, 1.1, 1.0]),
        "mercy" => Some([1.3, 0.85, 0.9, 1.0]),
        "counsel" => Some([1.05, 1.0, 0.9, 1.25]),
        "covenant" => Some([1.2, 1.15, 1.0, 1.0]),
        _ => None,
    }
}

fn general_profile() -> ContextProfile {
    ContextProfile::new("general")
        .keyword("love", [0.35, 0.0, 0.0, 0.05])
        .keyword("care", [0.3, 0.0, 0.0, 0.0])
        .keyword("kind", [0.25, 0.05, 0.0, 0.0])
        .keyword("kindness", [0.3, 0.05, 0.0, 0.0])
        .keyword("friend", [0.25, 0.0, 0.0, 0.0])
        .keyword("hate", [-0.35, 0.0, 0.1, 0.0])
        .keyword("fair", [0.0, 0.3, 0.0, 0.05])
        .keyword("fairness", [0.0, 0.35, 0.0, 0.05])
        .keyword("justice", [0.0, 0.35, 0.05, 0.05])
        .keyword("equal", [0.05, 0.3, 0.0, 0.0])
        .keyword("lawful", [0.0, 0.3, 0.05, 0.0])
        .keyword("unjust", [0.0, -0.35, 0.05, 0.0])
        .keyword("power", [0.0, 0.0, 0.35, 0.0])
        .keyword("strong", [0.0, 0.0, 0.3, 0.0])
        .keyword("strength", [0.0, 0.0, 0.3, 0.0])
        .keyword("control", [-0.05, 0.0, 0.3, 0.0])
        .keyword("authority", [0.0, 0.1, 0.3, 0.0])
        .keyword("weak", [0.0, 0.0, -0.3, 0.0])
        .keyword("wise", [0.0, 0.05, 0.0, 0.35])
        .keyword("wisdom", [0.0, 0.05, 0.0, 0.35])
        .keyword("learn", [0.0, 0.0, 0.0, 0.25])
        .keyword("insight", [0.0, 0.0, 0.0, 0.3])
        .keyword("think", [0.0, 0.0, 0.0, 0.2])
        .keyword("foolish", [0.0, 0.0, 0.0, -0.3])
        .keyword("common good", [0.15, 0.2, 0.0, 0.05])
}

fn biblical_profile() -> ContextProfile {
    ContextProfile::new("biblical")
        .keyword("love", [0.4, 0.0, 0.0, 0.05])
        .keyword("grace", [0.35, 0.0, -0.05, 0.05])
        .keyword("mercy", [0.35, -0.05, 0.0, 0.0])
        .keyword("compassion", [0.35, 0.0, 0.0, 0.0])
        .keyword("beloved", [0.3, 0.0, 0.0, 0.0])
        .keyword("charity", [0.3, 0.05, 0.0, 0.0])
        .keyword("justice", [0.0, 0.4, 0.05, 0.05])
        .keyword("righteous", [0.05, 0.35, 0.0, 0.05])
        .keyword("righteousness", [0.05, 0.35, 0.0, 0.05])
        .keyword("judgment", [-0.05, 0.35, 0.1, 0.0])
        .keyword("law", [0.0, 0.3, 0.05, 0.05])
        .keyword("covenant", [0.1, 0.3, 0.0, 0.05])
        .keyword("power", [0.0, 0.05, 0.4, 0.0])
        .keyword("almighty", [0.0, 0.05, 0.4, 0.05])
        .keyword("mighty", [0.0, 0.0, 0.35, 0.0])
        .keyword("throne", [0.0, 0.1, 0.3, 0.0])
        .keyword("glory", [0.05, 0.0, 0.3, 0.05])
        .keyword("dominion", [0.0, 0.05, 0.35, 0.0])
        .keyword("wisdom", [0.0, 0.05, 0.0, 0.4])
        .keyword("understanding", [0.0, 0.0, 0.0, 0.35])
        .keyword("knowledge", [0.0, 0.0, 0.0, 0.3])
        .keyword("discernment", [0.0, 0.05, 0.0, 0.35])
        .keyword("truth", [0.0, 0.1, 0.0, 0.3])
        .keyword("light", [0.1, 0.0, 0.0, 0.2])
        .keyword("eternal life", [0.25, 0.0, 0.05, 0.1])
        .keyword("holy spirit", [0.2, 0.0, 0.15, 0.15])
}

fn ethical_profile() -> ContextProfile {
    ContextProfile::new("ethical")
        .keyword("virtue", [0.15, 0.2, 0.0, 0.15])
        .keyword("duty", [0.0, 0.3, 0.05, 0.05])
        .keyword("harm", [-0.3, 0.1, 0.05, 0.0])
        .keyword("fairness", [0.05, 0.35, 0.0, 0.05])
        .keyword("rights", [0.05, 0.3, 0.0, 0.0])
        .keyword("consent", [0.1, 0.25, -0.05, 0.05])
        .keyword("courage", [0.05, 0.05, 0.25, 0.05])
        .keyword("honesty", [0.1, 0.2, 0.0, 0.15])
        .keyword("prudence", [0.0, 0.05, 0.0, 0.3])
        .keyword("compassion", [0.35, 0.0, 0.0, 0.05])
        .keyword("integrity", [0.05, 0.25, 0.05, 0.1])
        .keyword("cruelty", [-0.35, -0.1, 0.15, 0.0])
}

fn governance_profile() -> ContextProfile {
    ContextProfile::new("governance")
        .keyword("law", [0.0, 0.35, 0.1, 0.05])
        .keyword("order", [0.0, 0.2, 0.25, 0.0])
        .keyword("authority", [0.0, 0.1, 0.35, 0.0])
        .keyword("policy", [0.0, 0.15, 0.1, 0.15])
        .keyword("citizen", [0.15, 0.2, 0.0, 0.0])
        .keyword("welfare", [0.3, 0.15, 0.0, 0.0])
        .keyword("liberty", [0.1, 0.25, -0.05, 0.05])
        .keyword("mandate", [0.0, 0.1, 0.3, 0.0])
        .keyword("council", [0.0, 0.1, 0.1, 0.2])
        .keyword("tyranny", [-0.2, -0.3, 0.35, 0.0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles_present() {
        let registry = ContextRegistry::builtin();
        for name in ["general", "biblical", "ethical", "governance"] {
            assert!(registry.get(name).is_some(), "missing builtin: {name}");
        }
    }

    #[test]
    fn test_unknown_context_resolves_to_general() {
        let registry = ContextRegistry::builtin();
        let profile = registry.resolve("astrological").unwrap();
        assert_eq!(profile.name, "general");
    }

    #[test]
    fn test_known_context_resolves_to_itself() {
        let registry = ContextRegistry::builtin();
        let profile = registry.resolve("biblical").unwrap();
        assert_eq!(profile.name, "biblical");
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ContextRegistry::builtin();
        let before = registry.len();
        registry.register(ContextProfile::new("general"));
        assert_eq!(registry.len(), before);
        assert!(registry.get("general").unwrap().keywords.is_empty());
    }

    #[test]
    fn test_empty_registry_resolve() {
        let registry = ContextRegistry::empty();
        assert!(registry.resolve("anything").is_none());
    }

    #[test]
    fn test_names_sorted() {
        let registry = ContextRegistry::builtin();
        let names = registry.names();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_operation_weights_known() {
        let weights = operation_weights("judgment").unwrap();
        assert!(weights[1] > 1.0, "judgment should boost the justice axis");
    }

    #[test]
    fn test_operation_weights_unknown() {
        assert!(operation_weights("transmutation").is_none());
    }

    #[test]
    fn test_biblical_love_and_justice_distinct() {
        // The §8 scenario needs "love" and "justice" to land on different
        // points under the biblical profile.
        let profile = biblical_profile();
        assert_ne!(profile.keywords["love"], profile.keywords["justice"]);
    }
}
