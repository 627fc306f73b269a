use std::collections::{HashMap, HashSet};

use rusqlite::params;

use tetrad_core::Coordinate;

use crate::error::Result;
use crate::store::ConceptStore;

/// A directed concept-to-concept edge. Strength decreases monotonically
/// with distance: strength = 1 / (1 + distance).
#[derive(Clone, Debug)]
pub struct Relationship {
    pub concept_id: i64,
    pub related_id: i64,
    pub distance: f64,
    pub strength: f64,
    pub relationship_type: String,
}

/// A connected component of the distance-threshold graph.
#[derive(Clone, Debug)]
pub struct Cluster {
    pub members: Vec<i64>,
    pub centroid: Coordinate,
}

const PROXIMITY_TYPE: &str = "proximity";

/// Builds and queries the derived relationship graph. O(n²) per run,
/// acceptable at catalog scale; a spatial index over the 4D space is the
/// documented extension point if catalogs outgrow it.
pub struct RelationshipDiscovery<'a> {
    store: &'a ConceptStore,
}

impl<'a> RelationshipDiscovery<'a> {
    pub fn new(store: &'a ConceptStore) -> Self {
        Self { store }
    }

    /// Discover nearest-neighbor edges for a scope (one context or all).
    /// Keeps up to `max_relationships` nearest neighbors per concept with
    /// distance ≤ `max_distance`, one edge per undirected pair. Existing
    /// edges are skipped as no-ops. Returns the number of new edges.
    pub fn discover(
        &self,
        context: Option<&str>,
        max_distance: f64,
        max_relationships: usize,
    ) -> Result<usize> {
        let concepts = self.store.all_concepts(context)?;
        if concepts.len() < 2 {
            return Ok(0);
        }

        let existing = self.existing_pairs()?;
        let mut chosen: HashSet<(i64, i64)> = HashSet::new();
        let mut edges: Vec<Relationship> = Vec::new();

        for concept in &concepts {
            let mut neighbors: Vec<(i64, f64)> = concepts
                .iter()
                .filter(|other| other.id != concept.id)
                .map(|other| (other.id, concept.coordinate.distance(other.coordinate)))
                .filter(|(_, distance)| *distance <= max_distance)
                .collect();

            neighbors.sort_by(|a, b| a.1.total_cmp(&b.1));
            neighbors.truncate(max_relationships);

            for (related_id, distance) in neighbors {
                let pair = undirected(concept.id, related_id);
                if existing.contains(&pair) || !chosen.insert(pair) {
                    continue;
                }
                edges.push(Relationship {
                    concept_id: concept.id,
                    related_id,
                    distance,
                    strength: 1.0 / (1.0 + distance),
                    relationship_type: PROXIMITY_TYPE.to_string(),
                });
            }
        }

        if edges.is_empty() {
            return Ok(0);
        }

        let inserted = self.store.atomic(|store| {
            let mut stmt = store.conn().prepare(
                "INSERT OR IGNORE INTO relationships
                     (concept_id, related_id, distance, strength, relationship_type)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            let mut inserted = 0usize;
            for edge in &edges {
                inserted += stmt.execute(params![
                    edge.concept_id,
                    edge.related_id,
                    edge.distance,
                    edge.strength,
                    edge.relationship_type,
                ])?;
            }
            Ok(inserted)
        })?;

        tracing::debug!("discovery added {inserted} relationships");
        Ok(inserted)
    }

    /// Edges touching a concept, either direction.
    pub fn relationships_for(&self, concept_id: i64) -> Result<Vec<Relationship>> {
        let mut stmt = self.store.conn().prepare(
            "SELECT concept_id, related_id, distance, strength, relationship_type
             FROM relationships
             WHERE concept_id = ?1 OR related_id = ?1
             ORDER BY distance",
        )?;
        let relationships = stmt
            .query_map([concept_id], |row| {
                Ok(Relationship {
                    concept_id: row.get(0)?,
                    related_id: row.get(1)?,
                    distance: row.get(2)?,
                    strength: row.get(3)?,
                    relationship_type: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(relationships)
    }

    pub fn relationship_count(&self) -> Result<usize> {
        let n: i64 =
            self.store
                .conn()
                .query_row("SELECT count(*) FROM relationships", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Cluster the scope into connected components of the distance graph.
    /// Components below `min_cluster_size` are dropped. Largest first.
    pub fn clusters(
        &self,
        context: Option<&str>,
        max_distance: f64,
        min_cluster_size: usize,
    ) -> Result<Vec<Cluster>> {
        let concepts = self.store.all_concepts(context)?;
        let n = concepts.len();

        // Union-find over concept indexes.
        let mut parent: Vec<usize> = (0..n).collect();
        fn find(parent: &mut Vec<usize>, i: usize) -> usize {
            if parent[i] != i {
                let root = find(parent, parent[i]);
                parent[i] = root;
            }
            parent[i]
        }

        for i in 0..n {
            for j in (i + 1)..n {
                if concepts[i].coordinate.distance(concepts[j].coordinate) <= max_distance {
                    let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                    if ri != rj {
                        parent[ri] = rj;
                    }
                }
            }
        }

        let mut components: HashMap<usize, Vec<usize>> = HashMap::new();
        for i in 0..n {
            let root = find(&mut parent, i);
            components.entry(root).or_default().push(i);
        }

        let mut clusters: Vec<Cluster> = components
            .into_values()
            .filter(|members| members.len() >= min_cluster_size)
            .map(|members| {
                let mut sums = [0.0f64; 4];
                for &i in &members {
                    for (sum, v) in sums.iter_mut().zip(concepts[i].coordinate.to_array()) {
                        *sum += v;
                    }
                }
                let count = members.len() as f64;
                Cluster {
                    members: members.iter().map(|&i| concepts[i].id).collect(),
                    centroid: Coordinate::from_array(sums.map(|s| s / count)),
                }
            })
            .collect();

        clusters.sort_by(|a, b| b.members.len().cmp(&a.members.len()));
        Ok(clusters)
    }

    fn existing_pairs(&self) -> Result<HashSet<(i64, i64)>> {
        let mut stmt = self
            .store
            .conn()
            .prepare("SELECT concept_id, related_id FROM relationships")?;
        let pairs = stmt
            .query_map([], |row| Ok(undirected(row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(pairs)
    }
}

fn undirected(a: i64, b: i64) -> (i64, i64) {
    if a <= b { (a, b) } else { (b, a) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> ConceptStore {
        let store = ConceptStore::open_in_memory().unwrap();
        for (text, context) in [
            ("love", "biblical"),
            ("mercy", "biblical"),
            ("grace", "biblical"),
            ("justice", "biblical"),
            ("judgment", "biblical"),
        ] {
            store.store(text, context).unwrap();
        }
        store
    }

    #[test]
    fn test_discover_respects_bounds() {
        let store = seeded_store();
        let discovery = RelationshipDiscovery::new(&store);
        let added = discovery.discover(None, 0.5, 3).unwrap();
        assert!(added > 0, "nearby biblical concepts should link");

        let mut stmt = store
            .conn()
            .prepare("SELECT concept_id, related_id, distance FROM relationships")
            .unwrap();
        let rows: Vec<(i64, i64, f64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();

        let mut outgoing: HashMap<i64, usize> = HashMap::new();
        for (concept_id, related_id, distance) in rows {
            assert!(distance <= 0.5, "edge exceeds max_distance: {distance}");
            assert_ne!(concept_id, related_id, "self-loop");
            *outgoing.entry(concept_id).or_default() += 1;
        }
        for (id, count) in outgoing {
            assert!(count <= 3, "concept {id} has {count} outgoing edges");
        }
    }

    #[test]
    fn test_discover_no_duplicate_pairs() {
        let store = seeded_store();
        let discovery = RelationshipDiscovery::new(&store);
        discovery.discover(None, 2.0, 10).unwrap();

        let mut stmt = store
            .conn()
            .prepare("SELECT concept_id, related_id FROM relationships")
            .unwrap();
        let pairs: Vec<(i64, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();

        let mut seen = HashSet::new();
        for (a, b) in pairs {
            assert!(seen.insert(undirected(a, b)), "duplicate pair ({a}, {b})");
        }
    }

    #[test]
    fn test_discover_rerun_is_noop() {
        let store = seeded_store();
        let discovery = RelationshipDiscovery::new(&store);
        let first = discovery.discover(None, 2.0, 10).unwrap();
        assert!(first > 0);
        let second = discovery.discover(None, 2.0, 10).unwrap();
        assert_eq!(second, 0, "existing edges are no-ops");
        assert_eq!(discovery.relationship_count().unwrap(), first);
    }

    #[test]
    fn test_discover_strength_formula() {
        let store = seeded_store();
        let discovery = RelationshipDiscovery::new(&store);
        discovery.discover(None, 2.0, 10).unwrap();

        let mut stmt = store
            .conn()
            .prepare("SELECT distance, strength FROM relationships")
            .unwrap();
        let rows: Vec<(f64, f64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        for (distance, strength) in rows {
            assert!((strength - 1.0 / (1.0 + distance)).abs() < 1e-10);
        }
    }

    #[test]
    fn test_discover_empty_scope() {
        let store = ConceptStore::open_in_memory().unwrap();
        let discovery = RelationshipDiscovery::new(&store);
        assert_eq!(discovery.discover(None, 0.5, 3).unwrap(), 0);
        assert_eq!(discovery.discover(Some("nothing"), 0.5, 3).unwrap(), 0);
    }

    #[test]
    fn test_discover_context_scope() {
        let store = seeded_store();
        store.store("law", "governance").unwrap();
        store.store("order", "governance").unwrap();

        let discovery = RelationshipDiscovery::new(&store);
        discovery.discover(Some("governance"), 2.0, 10).unwrap();

        // Only governance concepts participate.
        let governance_ids: HashSet<i64> = store
            .all_concepts(Some("governance"))
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        for edge in store
            .conn()
            .prepare("SELECT concept_id, related_id FROM relationships")
            .unwrap()
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))
            .unwrap()
            .flatten()
        {
            assert!(governance_ids.contains(&edge.0));
            assert!(governance_ids.contains(&edge.1));
        }
    }

    #[test]
    fn test_relationships_for() {
        let store = seeded_store();
        let discovery = RelationshipDiscovery::new(&store);
        discovery.discover(None, 2.0, 10).unwrap();

        let love = store.get("love", "biblical").unwrap().unwrap();
        let edges = discovery.relationships_for(love.id).unwrap();
        assert!(!edges.is_empty());
        for edge in &edges {
            assert!(edge.concept_id == love.id || edge.related_id == love.id);
            assert_eq!(edge.relationship_type, "proximity");
        }
    }

    #[test]
    fn test_clusters_components_and_centroids() {
        let store = seeded_store();
        let discovery = RelationshipDiscovery::new(&store);

        // Wide threshold: everything biblical is one component.
        let clusters = discovery.clusters(Some("biblical"), 2.0, 2).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 5);

        let centroid = clusters[0].centroid;
        for v in centroid.to_array() {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_clusters_min_size_filter() {
        let store = seeded_store();
        let discovery = RelationshipDiscovery::new(&store);
        // Impossible size threshold drops every component.
        let clusters = discovery.clusters(None, 2.0, 100).unwrap();
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_clusters_split_by_tight_threshold() {
        let store = ConceptStore::open_in_memory().unwrap();
        // Two tight groups far apart: unmatched text sits at neutral,
        // "love love love" saturates the love axis.
        store.store("zzz one", "general").unwrap();
        store.store("zzz two", "general").unwrap();
        store.store("love love love", "general").unwrap();
        store.store("love love", "general").unwrap();

        let discovery = RelationshipDiscovery::new(&store);
        let clusters = discovery.clusters(None, 0.25, 2).unwrap();
        assert_eq!(clusters.len(), 2, "expected two separated components");
    }
}
