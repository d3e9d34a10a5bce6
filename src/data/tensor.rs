use arrow::datatypes::{ArrowNativeType, ArrowPrimitiveType, Float32Type, UInt64Type, UInt8Type};
use serde_json::Value as JsonValue;

// ---------------------------------------------------------------------------
// Element – numeric cell types a JSON series may be decoded into
// ---------------------------------------------------------------------------

/// A fixed-width element type with a matching Arrow primitive type.
pub trait Element: ArrowNativeType {
    type Arrow: ArrowPrimitiveType<Native = Self>;

    /// Name used in error messages.
    const NAME: &'static str;

    /// Decode a single JSON scalar, or `None` if it does not fit.
    fn from_json(value: &JsonValue) -> Option<Self>;
}

impl Element for f32 {
    type Arrow = Float32Type;
    const NAME: &'static str = "float32";

    fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            // Missing detections are stored as null; keep the slot as NaN.
            JsonValue::Null => Some(f32::NAN),
            other => other.as_f64().map(|v| v as f32),
        }
    }
}

impl Element for u64 {
    type Arrow = UInt64Type;
    const NAME: &'static str = "uint64";

    fn from_json(value: &JsonValue) -> Option<Self> {
        unsigned(value)
    }
}

impl Element for u8 {
    type Arrow = UInt8Type;
    const NAME: &'static str = "uint8";

    fn from_json(value: &JsonValue) -> Option<Self> {
        unsigned(value).and_then(|v| u8::try_from(v).ok())
    }
}

/// Non-negative integer, also written as an integral float (`1.0`).
fn unsigned(value: &JsonValue) -> Option<u64> {
    if let Some(v) = value.as_u64() {
        return Some(v);
    }
    let f = value.as_f64()?;
    // 2^64 is the first float past u64::MAX.
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < 18_446_744_073_709_551_616.0).then_some(f as u64)
}

// ---------------------------------------------------------------------------
// Tensor – dense row-major array decoded from nested JSON lists
// ---------------------------------------------------------------------------

/// A dense, rectangular array: `shape` plus row-major `values`.
///
/// A JSON scalar decodes to rank 0, `[1, 2]` to shape `[2]`,
/// `[[0, 0, 1], [0, 1, 1]]` to shape `[2, 3]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<N> {
    shape: Vec<usize>,
    values: Vec<N>,
}

impl<N: Element> Tensor<N> {
    /// Build from an explicit shape; `None` if the value count does not match.
    pub fn new(shape: Vec<usize>, values: Vec<N>) -> Option<Self> {
        (shape.iter().product::<usize>() == values.len()).then_some(Tensor { shape, values })
    }

    /// Decode a (possibly nested) JSON value. Ragged nesting is rejected.
    pub fn from_json(value: &JsonValue) -> Result<Self, String> {
        let mut shape = Vec::new();
        let mut cursor = value;
        while let JsonValue::Array(items) = cursor {
            shape.push(items.len());
            match items.first() {
                Some(first) => cursor = first,
                None => break,
            }
        }

        let mut values = Vec::with_capacity(shape.iter().product());
        flatten(value, &shape, &mut values)?;
        Ok(Tensor { shape, values })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[N] {
        &self.values
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Length of the leading axis (1 for a scalar).
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(1)
    }

    pub fn into_values(self) -> Vec<N> {
        self.values
    }
}

fn flatten<N: Element>(value: &JsonValue, shape: &[usize], out: &mut Vec<N>) -> Result<(), String> {
    match (shape.split_first(), value) {
        (None, JsonValue::Array(_)) => Err("ragged nesting: unexpected inner array".to_string()),
        (None, scalar) => {
            let v = N::from_json(scalar)
                .ok_or_else(|| format!("{scalar} is not a valid {}", N::NAME))?;
            out.push(v);
            Ok(())
        }
        (Some((&len, rest)), JsonValue::Array(items)) => {
            if items.len() != len {
                return Err(format!(
                    "ragged nesting: expected {len} items, found {}",
                    items.len()
                ));
            }
            items.iter().try_for_each(|item| flatten(item, rest, out))
        }
        (Some(_), other) => Err(format!("ragged nesting: expected an array, found {other}")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_points_row_major() {
        let t = Tensor::<f32>::from_json(&json!([[0.5, 1.0, 2.0], [3.0, 4.0, 5.5]])).unwrap();
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.values(), &[0.5, 1.0, 2.0, 3.0, 4.0, 5.5]);
        assert_eq!(t.rows(), 2);
    }

    #[test]
    fn scalar_and_empty() {
        let s = Tensor::<u64>::from_json(&json!(7)).unwrap();
        assert_eq!(s.rank(), 0);
        assert_eq!(s.values(), &[7]);

        let e = Tensor::<u64>::from_json(&json!([])).unwrap();
        assert_eq!(e.shape(), &[0]);
        assert!(e.values().is_empty());
    }

    #[test]
    fn null_becomes_nan_for_floats_only() {
        let t = Tensor::<f32>::from_json(&json!([1.0, null])).unwrap();
        assert!(t.values()[1].is_nan());
        assert!(Tensor::<u64>::from_json(&json!([1, null])).is_err());
    }

    #[test]
    fn rejects_ragged_and_out_of_range() {
        let err = Tensor::<f32>::from_json(&json!([[1.0, 2.0], [3.0]])).unwrap_err();
        assert!(err.contains("ragged"), "{err}");
        assert!(Tensor::<f32>::from_json(&json!([[1.0], 2.0])).is_err());
        assert!(Tensor::<u8>::from_json(&json!([0, 256])).is_err());
        assert!(Tensor::<u64>::from_json(&json!([-1])).is_err());
    }

    #[test]
    fn integral_floats_decode_as_unsigned() {
        let t = Tensor::<u8>::from_json(&json!([1.0, 0.0])).unwrap();
        assert_eq!(t.values(), &[1, 0]);
        let ts = Tensor::<u64>::from_json(&json!([1.5e12, 40])).unwrap();
        assert_eq!(ts.values(), &[1_500_000_000_000, 40]);

        assert!(Tensor::<u8>::from_json(&json!([0.5])).is_err());
        assert!(Tensor::<u8>::from_json(&json!([-1.0])).is_err());
        assert!(Tensor::<u8>::from_json(&json!([256.0])).is_err());
        assert!(Tensor::<u64>::from_json(&json!([1e20])).is_err());
    }

    #[test]
    fn new_checks_value_count() {
        assert!(Tensor::new(vec![2, 2], vec![1u8, 2, 3, 4]).is_some());
        assert!(Tensor::new(vec![2, 2], vec![1u8, 2, 3]).is_none());
    }
}
