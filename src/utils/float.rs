use std::{
    fmt::{Debug, Display},
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// canonical raw float bit
const CANONICAL_NAN_BITS: u64 = 0x7ff8_0000_0000_0000_u64;

/// The f64 which impl Eq, Hash.
///
/// Equality is bitwise (all NaNs are equal to each other, `0.0 != -0.0`), so
/// two floats that print differently never collapse into one constant.
/// Serialized as the raw IEEE-754 bit pattern so that every value, including
/// infinities and NaN, round-trips exactly.
#[derive(Clone, Copy, PartialOrd)]
pub struct Float(pub f64);

impl Float {
    fn canonical_bits(self) -> u64 {
        if self.0.is_nan() {
            CANONICAL_NAN_BITS
        } else {
            self.0.to_bits()
        }
    }
}

impl From<f64> for Float {
    fn from(value: f64) -> Self {
        Float(value)
    }
}

impl From<Float> for f64 {
    fn from(value: Float) -> Self {
        value.0
    }
}

impl PartialEq for Float {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_bits() == other.canonical_bits()
    }
}

impl Eq for Float {}

impl Hash for Float {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_bits().hash(state);
    }
}

impl Debug for Float {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for Float {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Keep a fractional part so floats never print like ints.
        if self.0.is_finite() && self.0.fract() == 0.0 && self.0.abs() < 1e16 {
            write!(f, "{:.1}", self.0)
        } else {
            Display::fmt(&self.0, f)
        }
    }
}

impl Serialize for Float {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.canonical_bits())
    }
}

impl<'de> Deserialize<'de> for Float {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u64::deserialize(deserializer).map(|bits| Float(f64::from_bits(bits)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_eq_is_bitwise() {
        assert_eq!(Float(f64::NAN), Float(f64::NAN));
        assert_ne!(Float(0.0), Float(-0.0));
        assert_eq!(Float(1.5), Float(1.5));
    }

    #[test]
    fn float_display() {
        assert_eq!(Float(2.0).to_string(), "2.0");
        assert_eq!(Float(0.25).to_string(), "0.25");
        assert_eq!(Float(f64::INFINITY).to_string(), "inf");
    }
}
