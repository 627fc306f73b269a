use serde::{Deserialize, Serialize};

use crate::constants::{EPSILON, SACRED_NUMBERS};

/// A numeric value scored against the canonical sacred set.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SacredNumber {
    pub value: f64,
    pub is_sacred: bool,
    pub resonance: f64,
}

/// Membership in the canonical set, within floating tolerance.
pub fn is_sacred(value: f64) -> bool {
    SACRED_NUMBERS.iter().any(|s| (s - value).abs() < EPSILON)
}

/// The canonical member closest to `value`.
pub fn nearest_sacred(value: f64) -> f64 {
    let mut nearest = SACRED_NUMBERS[0];
    for &s in &SACRED_NUMBERS[1..] {
        if (s - value).abs() < (nearest - value).abs() {
            nearest = s;
        }
    }
    nearest
}

/// Score a value: members resonate at 1.0, everything else decays with
/// distance to the nearest member.
pub fn evaluate(value: f64) -> SacredNumber {
    let member = is_sacred(value);
    let resonance = if member {
        1.0
    } else {
        1.0 / (1.0 + (value - nearest_sacred(value)).abs())
    };
    SacredNumber {
        value,
        is_sacred: member,
        resonance,
    }
}
