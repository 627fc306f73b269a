//! Engine-independent JSON serialization of every logical table, for
//! cross-engine migration. One document, order-independent top-level keys:
//! metadata, concepts, sacred_numbers, anchors, relationships.

use rusqlite::params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tetrad_core::now_iso8601;

use crate::error::Result;
use crate::store::ConceptStore;

pub const INTERCHANGE_VERSION: &str = "1.0";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Interchange {
    pub metadata: Metadata,
    pub concepts: Vec<ConceptRow>,
    pub sacred_numbers: Vec<SacredRow>,
    pub anchors: Vec<AnchorRow>,
    pub relationships: Vec<RelationshipRow>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Metadata {
    pub version: String,
    pub exported_at: String,
    pub export_id: String,
    pub concept_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConceptRow {
    pub id: i64,
    pub text: String,
    pub context: String,
    pub love: f64,
    pub justice: f64,
    pub power: f64,
    pub wisdom: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SacredRow {
    pub id: i64,
    pub value: f64,
    pub is_sacred: bool,
    pub resonance: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnchorRow {
    pub id: i64,
    pub name: String,
    pub love: f64,
    pub justice: f64,
    pub power: f64,
    pub wisdom: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationshipRow {
    pub concept_id: i64,
    pub related_id: i64,
    pub distance: f64,
    pub strength: f64,
    pub relationship_type: String,
}

/// Snapshot every logical table into an interchange document.
pub fn export(store: &ConceptStore) -> Result<Interchange> {
    let concepts: Vec<ConceptRow> = store
        .all_concepts(None)?
        .into_iter()
        .map(|c| ConceptRow {
            id: c.id,
            text: c.text,
            context: c.context,
            love: c.coordinate.love,
            justice: c.coordinate.justice,
            power: c.coordinate.power,
            wisdom: c.coordinate.wisdom,
            embedding: c.embedding,
            created_at: c.created_at,
            updated_at: c.updated_at,
        })
        .collect();

    let sacred_numbers: Vec<SacredRow> = store
        .list_sacred_numbers()?
        .into_iter()
        .map(|s| SacredRow {
            id: s.id,
            value: s.value,
            is_sacred: s.is_sacred,
            resonance: s.resonance,
        })
        .collect();

    let anchors: Vec<AnchorRow> = store
        .anchors()?
        .into_iter()
        .map(|a| AnchorRow {
            id: a.id,
            name: a.name,
            love: a.coordinate.love,
            justice: a.coordinate.justice,
            power: a.coordinate.power,
            wisdom: a.coordinate.wisdom,
        })
        .collect();

    let mut stmt = store.conn().prepare(
        "SELECT concept_id, related_id, distance, strength, relationship_type
         FROM relationships ORDER BY concept_id, related_id",
    )?;
    let relationships = stmt
        .query_map([], |row| {
            Ok(RelationshipRow {
                concept_id: row.get(0)?,
                related_id: row.get(1)?,
                distance: row.get(2)?,
                strength: row.get(3)?,
                relationship_type: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Interchange {
        metadata: Metadata {
            version: INTERCHANGE_VERSION.to_string(),
            exported_at: now_iso8601(),
            export_id: Uuid::new_v4().to_string(),
            concept_count: concepts.len(),
        },
        concepts,
        sacred_numbers,
        anchors,
        relationships,
    })
}

/// Replace the store's contents with the document, inside one transaction.
/// Any failure rolls the whole restore back, leaving the store unchanged.
pub fn apply(store: &ConceptStore, doc: &Interchange) -> Result<()> {
    store.atomic(|s| {
        let conn = s.conn();
        conn.execute_batch(
            "DELETE FROM relationships;
             DELETE FROM concepts;
             DELETE FROM sacred_numbers;
             DELETE FROM anchors;",
        )?;

        {
            let mut stmt = conn.prepare(
                "INSERT INTO concepts
                     (id, text, context, love, justice, power, wisdom, embedding, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for c in &doc.concepts {
                let embedding = c.embedding.as_deref().map(crate::store::encode_embedding);
                stmt.execute(params![
                    c.id, c.text, c.context, c.love, c.justice, c.power, c.wisdom, embedding,
                    c.created_at, c.updated_at,
                ])?;
            }
        }
        {
            let mut stmt = conn.prepare(
                "INSERT INTO sacred_numbers (id, value, is_sacred, resonance)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for n in &doc.sacred_numbers {
                stmt.execute(params![n.id, n.value, n.is_sacred as i32, n.resonance])?;
            }
        }
        {
            let mut stmt = conn.prepare(
                "INSERT INTO anchors (id, name, love, justice, power, wisdom)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for a in &doc.anchors {
                stmt.execute(params![a.id, a.name, a.love, a.justice, a.power, a.wisdom])?;
            }
        }
        {
            let mut stmt = conn.prepare(
                "INSERT INTO relationships
                     (concept_id, related_id, distance, strength, relationship_type)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for r in &doc.relationships {
                stmt.execute(params![
                    r.concept_id,
                    r.related_id,
                    r.distance,
                    r.strength,
                    r.relationship_type,
                ])?;
            }
        }

        Ok(())
    })?;

    store.clear_cache();
    tracing::debug!(
        "interchange applied: {} concepts, {} relationships",
        doc.concepts.len(),
        doc.relationships.len()
    );
    Ok(())
}
