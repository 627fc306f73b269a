use serde::{Deserialize, Serialize};

use crate::constants::{EPSILON, MAX_AXIS_DEVIATION, MAX_DISTANCE, NEUTRAL, PRIMARY_ANCHOR};

/// The four named semantic dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Love,
    Justice,
    Power,
    Wisdom,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::Love, Axis::Justice, Axis::Power, Axis::Wisdom];

    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Love => "love",
            Axis::Justice => "justice",
            Axis::Power => "power",
            Axis::Wisdom => "wisdom",
        }
    }
}

/// A point in the [0,1]⁴ semantic space.
///
/// Always clamped: construction forces each axis into [0,1], so derived
/// metrics never see out-of-range values regardless of keyword weights.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Coordinate {
    pub love: f64,
    pub justice: f64,
    pub power: f64,
    pub wisdom: f64,
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        (self.love - other.love).abs() < EPSILON
            && (self.justice - other.justice).abs() < EPSILON
            && (self.power - other.power).abs() < EPSILON
            && (self.wisdom - other.wisdom).abs() < EPSILON
    }
}

fn clamp01(v: f64) -> f64 {
    if v.is_nan() { NEUTRAL } else { v.clamp(0.0, 1.0) }
}

impl Coordinate {
    /// Create a new coordinate, each axis clamped to [0,1].
    pub fn new(love: f64, justice: f64, power: f64, wisdom: f64) -> Self {
        Self {
            love: clamp01(love),
            justice: clamp01(justice),
            power: clamp01(power),
            wisdom: clamp01(wisdom),
        }
    }

    /// The neutral midpoint (0.5, 0.5, 0.5, 0.5).
    pub fn neutral() -> Self {
        Self::new(NEUTRAL, NEUTRAL, NEUTRAL, NEUTRAL)
    }

    /// The primary anchor (1, 1, 1, 1).
    pub fn primary_anchor() -> Self {
        Self::from_array(PRIMARY_ANCHOR)
    }

    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Love => self.love,
            Axis::Justice => self.justice,
            Axis::Power => self.power,
            Axis::Wisdom => self.wisdom,
        }
    }

    /// Convert to [love, justice, power, wisdom] array for serialization.
    pub fn to_array(self) -> [f64; 4] {
        [self.love, self.justice, self.power, self.wisdom]
    }

    /// Create from [love, justice, power, wisdom] array.
    pub fn from_array(arr: [f64; 4]) -> Self {
        Self::new(arr[0], arr[1], arr[2], arr[3])
    }

    /// Euclidean distance in 4-space. Range: [0, 2].
    pub fn distance(self, other: Self) -> f64 {
        let dl = self.love - other.love;
        let dj = self.justice - other.justice;
        let dp = self.power - other.power;
        let dw = self.wisdom - other.wisdom;
        (dl * dl + dj * dj + dp * dp + dw * dw).sqrt()
    }

    /// Normalized inverse distance from the primary anchor. Range: [0, 1].
    /// resonance(c) = max(0, 1 − distance(c, (1,1,1,1)) / 2)
    pub fn resonance(self) -> f64 {
        (1.0 - self.distance(Self::primary_anchor()) / MAX_DISTANCE).max(0.0)
    }

    /// 1 − normalized standard deviation of the four axis values.
    /// 1.0 means perfectly even axes, 0.0 means maximal spread.
    pub fn balance(self) -> f64 {
        let values = self.to_array();
        let mean = values.iter().sum::<f64>() / 4.0;
        let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / 4.0;
        (1.0 - variance.sqrt() / MAX_AXIS_DEVIATION).clamp(0.0, 1.0)
    }

    /// Mean axis value — projection toward the primary anchor. Range: [0, 1].
    pub fn alignment(self) -> f64 {
        self.to_array().iter().sum::<f64>() / 4.0
    }

    /// The axis with the highest value and that value.
    /// Ties resolve in axis declaration order.
    pub fn dominant_axis(self) -> (Axis, f64) {
        let mut best = (Axis::Love, self.love);
        for axis in [Axis::Justice, Axis::Power, Axis::Wisdom] {
            let v = self.axis(axis);
            if v > best.1 {
                best = (axis, v);
            }
        }
        best
    }
}
