/// Primary anchor: all four axes at maximum, (1,1,1,1).
pub const PRIMARY_ANCHOR: [f64; 4] = [1.0, 1.0, 1.0, 1.0];

/// Neutral midpoint value for a single axis.
pub const NEUTRAL: f64 = 0.5;

/// Maximum Euclidean distance between two points in [0,1]⁴:
/// from (0,0,0,0) to (1,1,1,1).
pub const MAX_DISTANCE: f64 = 2.0;

/// Maximum standard deviation of four values in [0,1]
/// (two axes at 0, two at 1).
pub const MAX_AXIS_DEVIATION: f64 = 0.5;

/// Numerical epsilon for near-zero comparisons
pub const EPSILON: f64 = 1e-10;

/// Implicit radius when semantic search degrades to proximity search.
pub const SEMANTIC_FALLBACK_RADIUS: f64 = 1.5;

/// Canonical sacred number set, ascending.
pub const SACRED_NUMBERS: [f64; 5] = [3.0, 7.0, 12.0, 40.0, 70.0];

/// Context profile used when a requested context name is unknown.
pub const DEFAULT_CONTEXT: &str = "general";
