use tetrad_core::{Coordinate, SEMANTIC_FALLBACK_RADIUS, cosine_similarity};

use crate::error::Result;
use crate::store::{Concept, ConceptStore};

/// A search result: the full record plus the metric that justified its
/// inclusion (distance for proximity/anchor search, resonance or cosine
/// similarity for the others).
#[derive(Clone, Debug)]
pub struct SearchHit {
    pub concept: Concept,
    pub metric: f64,
}

/// Distance-based retrieval over a ConceptStore. Holds only a store
/// reference — composition, not inheritance.
pub struct QueryEngine<'a> {
    store: &'a ConceptStore,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a ConceptStore) -> Self {
        Self { store }
    }

    /// Records with distance ≤ max_distance from target, ascending by
    /// distance, ties by insertion order. Empty results are valid.
    pub fn proximity_search(
        &self,
        target: Coordinate,
        max_distance: f64,
        context: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let mut hits: Vec<SearchHit> = self
            .store
            .all_concepts(context)?
            .into_iter()
            .filter_map(|concept| {
                let distance = target.distance(concept.coordinate);
                (distance <= max_distance).then_some(SearchHit {
                    concept,
                    metric: distance,
                })
            })
            .collect();

        // Stable sort over id-ordered rows keeps insertion order for ties.
        hits.sort_by(|a, b| a.metric.total_cmp(&b.metric));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Records with resonance ≥ min_resonance, descending by resonance.
    pub fn resonance_search(
        &self,
        min_resonance: f64,
        context: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let mut hits: Vec<SearchHit> = self
            .store
            .all_concepts(context)?
            .into_iter()
            .filter_map(|concept| {
                let resonance = concept.coordinate.resonance();
                (resonance >= min_resonance).then_some(SearchHit {
                    concept,
                    metric: resonance,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.metric.total_cmp(&a.metric));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Records nearest a named anchor, ascending by distance. An unknown
    /// anchor name yields an empty result, never an error.
    pub fn anchor_search(
        &self,
        anchor_name: &str,
        max_distance: f64,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        match self.store.anchor(anchor_name)? {
            Some(anchor) => self.proximity_search(anchor.coordinate, max_distance, None, limit),
            None => Ok(Vec::new()),
        }
    }

    /// Rank by embedding cosine similarity when a model is configured;
    /// otherwise compute the query's own coordinates and degrade to a
    /// generous proximity search.
    pub fn semantic_search(&self, query_text: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let engine = self.store.engine();

        if let Some(query_embedding) = engine.embed(query_text) {
            let mut hits: Vec<SearchHit> = self
                .store
                .all_concepts(None)?
                .into_iter()
                .filter_map(|concept| {
                    let embedding = concept.embedding.as_deref()?;
                    let similarity = cosine_similarity(&query_embedding, embedding);
                    Some(SearchHit {
                        concept,
                        metric: similarity,
                    })
                })
                .collect();

            hits.sort_by(|a, b| b.metric.total_cmp(&a.metric));
            hits.truncate(limit);
            return Ok(hits);
        }

        let target = engine.calculate_coordinates(query_text, tetrad_core::DEFAULT_CONTEXT);
        self.proximity_search(target, SEMANTIC_FALLBACK_RADIUS, None, limit)
    }
}
