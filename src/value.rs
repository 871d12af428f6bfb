//! Attribute value types: the tagged [`Value`] union, table [`IndexValue`]
//! references, and the [`Scaling`] used to turn stored integers into
//! application-level reals.

/// A small integer identifying an entry in one of a layer's tables.
///
/// `u32::MAX` is a reserved sentinel meaning "not set"; [`IndexValue::get`]
/// only checks bounds when the value is actually dereferenced, matching the
/// lazy validation the layer reader performs for every other table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IndexValue(u32);

impl IndexValue {
    pub const NONE: IndexValue = IndexValue(u32::MAX);

    pub fn new(v: u32) -> IndexValue {
        IndexValue(v)
    }

    pub fn is_set(self) -> bool {
        self.0 != u32::MAX
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl Default for IndexValue {
    fn default() -> Self {
        IndexValue::NONE
    }
}

impl From<u32> for IndexValue {
    fn from(v: u32) -> Self {
        IndexValue(v)
    }
}

/// A tagged scalar attribute value.
///
/// `Null`, `InlineSint` and `InlineUint` only occur in v3 tiles: `Null` has
/// no v2 wire representation, and the inline variants carry their payload
/// directly in the structured-value stream instead of through a table.
#[derive(Clone, Debug, PartialEq)]
pub enum Value<'a> {
    String(&'a str),
    Float(f32),
    Double(f64),
    Int(i64),
    UInt(u64),
    Sint(i64),
    Bool(bool),
    Null,
    InlineSint(i64),
    InlineUint(u64),
}

impl<'a> Value<'a> {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Sint(_) => "sint",
            Value::Bool(_) => "bool",
            Value::Null => "null",
            Value::InlineSint(_) => "inline_sint",
            Value::InlineUint(_) => "inline_uint",
        }
    }

    pub fn as_str(&self) -> crate::error::Result<&'a str> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(crate::error::Error::Type {
                expected: "string",
                actual: other.kind_name(),
            }),
        }
    }

    pub fn as_f64(&self) -> crate::error::Result<f64> {
        match self {
            Value::Double(v) => Ok(*v),
            Value::Float(v) => Ok(f64::from(*v)),
            other => Err(crate::error::Error::Type {
                expected: "double",
                actual: other.kind_name(),
            }),
        }
    }

    pub fn as_bool(&self) -> crate::error::Result<bool> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => Err(crate::error::Error::Type {
                expected: "bool",
                actual: other.kind_name(),
            }),
        }
    }

    pub fn as_i64(&self) -> crate::error::Result<i64> {
        match self {
            Value::Int(v) | Value::Sint(v) | Value::InlineSint(v) => Ok(*v),
            other => Err(crate::error::Error::Type {
                expected: "int",
                actual: other.kind_name(),
            }),
        }
    }

    pub fn as_u64(&self) -> crate::error::Result<u64> {
        match self {
            Value::UInt(v) | Value::InlineUint(v) => Ok(*v),
            other => Err(crate::error::Error::Type {
                expected: "uint",
                actual: other.kind_name(),
            }),
        }
    }
}

/// The `(offset, multiplier, base)` triple used to convert stored integers
/// into application-level real numbers: `decode(v) = base + multiplier *
/// (offset + v)`.
///
/// One elevation scaling and zero or more attribute scalings live in each
/// v3 layer; features reference them by small integer index.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Scaling {
    pub offset: i64,
    pub multiplier: f64,
    pub base: f64,
}

impl Default for Scaling {
    fn default() -> Self {
        Scaling {
            offset: 0,
            multiplier: 1.0,
            base: 0.0,
        }
    }
}

impl Scaling {
    pub fn new(offset: i64, multiplier: f64, base: f64) -> Scaling {
        Scaling {
            offset,
            multiplier,
            base,
        }
    }

    pub fn decode(&self, v: i64) -> f64 {
        self.base + self.multiplier * ((self.offset + v) as f64)
    }

    /// Encodes `d` back to the stored integer, rounding ties away from zero
    /// and saturating rather than wrapping on overflow. Spec is silent on
    /// rounding at exactly `.5`; round-half-away-from-zero matches the
    /// reference fixtures' binary output.
    pub fn encode(&self, d: f64) -> i64 {
        let unscaled = (d - self.base) / self.multiplier - (self.offset as f64);
        let rounded = round_half_away_from_zero(unscaled);
        if rounded >= i64::MAX as f64 {
            i64::MAX
        } else if rounded <= i64::MIN as f64 {
            i64::MIN
        } else {
            rounded as i64
        }
    }
}

fn round_half_away_from_zero(v: f64) -> f64 {
    if v >= 0.0 {
        (v + 0.5).floor()
    } else {
        (v - 0.5).ceil()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn scaling_decode_with_a_fractional_multiplier_is_within_tolerance() {
        let s = Scaling::new(0, 0.1, 0.0);
        assert_relative_eq!(s.decode(3), 0.3, epsilon = 1e-9);
    }

    #[test]
    fn scaling_round_trips_default() {
        let s = Scaling::default();
        assert_eq!(s.decode(5), 5.0);
        assert_eq!(s.encode(5.0), 5);
    }

    #[test]
    fn scaling_decode_applies_offset_then_multiplier_then_base() {
        let s = Scaling::new(10, 2.0, 100.0);
        // base + multiplier * (offset + v) = 100 + 2 * (10 + 3) = 126
        assert_eq!(s.decode(3), 126.0);
    }

    #[test]
    fn scaling_encode_ties_round_away_from_zero() {
        let s = Scaling::default();
        assert_eq!(s.encode(2.5), 3);
        assert_eq!(s.encode(-2.5), -3);
    }

    #[test]
    fn index_value_sentinel_is_unset() {
        assert!(!IndexValue::NONE.is_set());
        assert!(IndexValue::new(0).is_set());
    }
}
