use crate::context::{ContextProfile, ContextRegistry, operation_weights};
use crate::coordinate::{Axis, Coordinate};
use crate::embedding::{AxisReferences, EmbeddingModel, cosine_similarity};
use crate::tokenizer::{token_phrases, tokenize};

/// Maps (text, context) to a point in [0,1]⁴.
///
/// Deterministic and total: identical input always yields identical output,
/// across processes and restarts, and no input can make it fail. Scoring
/// precedence: keyword table, then embedding fallback, then the neutral
/// midpoint.
pub struct CoordinateEngine {
    registry: ContextRegistry,
    model: Option<Box<dyn EmbeddingModel>>,
    references: Option<AxisReferences>,
}

impl Default for CoordinateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinateEngine {
    /// Engine with the built-in context profiles and no embedding model.
    pub fn new() -> Self {
        Self::with_registry(ContextRegistry::builtin())
    }

    pub fn with_registry(registry: ContextRegistry) -> Self {
        Self {
            registry,
            model: None,
            references: None,
        }
    }

    /// Attach an embedding model. Per-axis reference embeddings are
    /// computed once here, not on every call.
    pub fn set_model(&mut self, model: Box<dyn EmbeddingModel>) {
        self.references = Some(AxisReferences::from_model(model.as_ref()));
        self.model = Some(model);
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    pub fn register_profile(&mut self, profile: ContextProfile) {
        self.registry.register(profile);
    }

    /// Embed text with the attached model, if any.
    pub fn embed(&self, text: &str) -> Option<Vec<f32>> {
        self.model.as_ref().map(|m| m.embed(text))
    }

    /// Compute the coordinate for (text, context).
    ///
    /// Empty/whitespace text and unknown context names degrade to safe
    /// defaults rather than failing.
    pub fn calculate_coordinates(&self, text: &str, context: &str) -> Coordinate {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Coordinate::neutral();
        }

        if let Some(profile) = self.registry.resolve(context)
            && let Some(coordinate) = score_keywords(profile, &tokens)
        {
            return coordinate;
        }

        if let (Some(model), Some(references)) = (&self.model, &self.references) {
            let query = model.embed(text);
            return Coordinate::from_array(Axis::ALL.map(|axis| {
                let sim = cosine_similarity(&query, references.reference(axis));
                (sim + 1.0) / 2.0
            }));
        }

        Coordinate::neutral()
    }

    /// Contextual weighting pass: multiply each axis by the named
    /// operation's fixed factor, re-clamped. Unknown operations are
    /// identity.
    pub fn apply_weighting(&self, coordinate: Coordinate, operation: &str) -> Coordinate {
        match operation_weights(operation) {
            Some(weights) => {
                let v = coordinate.to_array();
                Coordinate::new(
                    v[0] * weights[0],
                    v[1] * weights[1],
                    v[2] * weights[2],
                    v[3] * weights[3],
                )
            }
            None => coordinate,
        }
    }
}

/// Sum signed per-axis contributions for every matching token and bigram,
/// then squash each axis into [0,1] with tanh so repeated keywords cannot
/// escape range. None when nothing matched.
fn score_keywords(profile: &ContextProfile, tokens: &[String]) -> Option<Coordinate> {
    let mut sums = [0.0f64; 4];
    let mut matched = false;

    for phrase in token_phrases(tokens) {
        if let Some(deltas) = profile.keywords.get(&phrase) {
            matched = true;
            for (sum, delta) in sums.iter_mut().zip(deltas.iter()) {
                *sum += delta;
            }
        }
    }
    for token in tokens {
        if let Some(deltas) = profile.keywords.get(token.as_str()) {
            matched = true;
            for (sum, delta) in sums.iter_mut().zip(deltas.iter()) {
                *sum += delta;
            }
        }
    }

    matched.then(|| Coordinate::from_array(sums.map(squash)))
}

/// Bounded transform onto [0,1]: 0.5 at zero contribution, saturating
/// smoothly toward 0 and 1.
fn squash(sum: f64) -> f64 {
    0.5 + sum.tanh() / 2.0
}
