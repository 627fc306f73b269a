//! Four-axis semantic coordinate engine.
//!
//! Maps short text "concepts" into a fixed [0,1]⁴ space (love, justice,
//! power, wisdom) with a deterministic keyword scorer, an optional
//! embedding fallback, and derived scalar metrics (distance, resonance,
//! balance, alignment).
//!
//! Zero I/O — pure math engine with no opinions about transport or persistence.

pub mod constants;
pub mod context;
pub mod coordinate;
pub mod embedding;
pub mod engine;
pub mod sacred;
pub mod time;
pub mod tokenizer;

pub use constants::{
    DEFAULT_CONTEXT, EPSILON, MAX_DISTANCE, NEUTRAL, PRIMARY_ANCHOR, SACRED_NUMBERS,
    SEMANTIC_FALLBACK_RADIUS,
};
pub use context::{ContextProfile, ContextRegistry, operation_weights};
pub use coordinate::{Axis, Coordinate};
pub use embedding::{AxisReferences, EmbeddingModel, axis_reference_text, cosine_similarity};
pub use engine::CoordinateEngine;
pub use sacred::SacredNumber;
pub use time::{now_iso8601, now_unix_secs, timestamp_slug, unix_to_iso8601};
