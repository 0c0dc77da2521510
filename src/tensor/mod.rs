//! The tensor exchange layer: an immutable, typed n-d array that is the
//! sole ABI between application code and the backend.
//!
//! Every accessor returns a deep copy of shape and data unless explicitly
//! documented as sharing (see `squeeze`). Element layout is row-major:
//! the last axis is contiguous.

use half::f16;

use crate::error::{OnnxKitError, Result};

/// Element-type tag carried alongside a tensor's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    F32,
    F16,
    I64,
    Utf8,
}

impl ElementType {
    fn name(self) -> &'static str {
        match self {
            ElementType::F32 => "f32",
            ElementType::F16 => "f16",
            ElementType::I64 => "i64",
            ElementType::Utf8 => "utf8",
        }
    }
}

#[derive(Debug, Clone)]
enum TensorData {
    F32(Vec<f32>),
    F16(Vec<u16>),
    I64(Vec<i64>),
    Utf8(Vec<String>),
}

impl TensorData {
    fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::F16(v) => v.len(),
            TensorData::I64(v) => v.len(),
            TensorData::Utf8(v) => v.len(),
        }
    }

    fn element_type(&self) -> ElementType {
        match self {
            TensorData::F32(_) => ElementType::F32,
            TensorData::F16(_) => ElementType::F16,
            TensorData::I64(_) => ElementType::I64,
            TensorData::Utf8(_) => ElementType::Utf8,
        }
    }
}

/// An immutable, typed n-d array with shape algebra and slicing.
#[derive(Debug, Clone)]
pub struct Tensor {
    shape: Vec<usize>,
    data: TensorData,
}

fn shape_product(shape: &[usize]) -> usize {
    shape.iter().product()
}

fn check_len(shape: &[usize], actual: usize) -> Result<()> {
    let expected = shape_product(shape);
    if expected != actual {
        return Err(OnnxKitError::ShapeMismatch {
            shape: shape.to_vec(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Normalize a possibly-negative axis index (`-1` = last axis) against `rank`.
fn normalize_axis(axis: i64, rank: usize) -> Result<usize> {
    let resolved = if axis < 0 { axis + rank as i64 } else { axis };
    if resolved < 0 || resolved as usize >= rank {
        return Err(OnnxKitError::AxisOutOfRange { axis, rank });
    }
    Ok(resolved as usize)
}

/// Normalize a possibly-negative element index (`-1` = last) against `size`.
fn normalize_index(index: i64, size: usize) -> Result<usize> {
    let resolved = if index < 0 { index + size as i64 } else { index };
    if resolved < 0 || resolved as usize >= size {
        return Err(OnnxKitError::IndexOutOfRange { index, size });
    }
    Ok(resolved as usize)
}

impl Tensor {
    pub fn from_f32(data: Vec<f32>, shape: Vec<usize>) -> Result<Self> {
        check_len(&shape, data.len())?;
        Ok(Self {
            shape,
            data: TensorData::F32(data),
        })
    }

    /// Build from raw IEEE-754 half-precision bit patterns.
    pub fn from_f16(bits: Vec<u16>, shape: Vec<usize>) -> Result<Self> {
        check_len(&shape, bits.len())?;
        Ok(Self {
            shape,
            data: TensorData::F16(bits),
        })
    }

    pub fn from_i64(data: Vec<i64>, shape: Vec<usize>) -> Result<Self> {
        check_len(&shape, data.len())?;
        Ok(Self {
            shape,
            data: TensorData::I64(data),
        })
    }

    pub fn from_utf8(data: Vec<String>, shape: Vec<usize>) -> Result<Self> {
        check_len(&shape, data.len())?;
        Ok(Self {
            shape,
            data: TensorData::Utf8(data),
        })
    }

    pub fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    fn type_mismatch(&self, expected: ElementType) -> OnnxKitError {
        OnnxKitError::TypeMismatch {
            expected: expected.name(),
            actual: self.element_type().name(),
        }
    }

    /// Widen to `f32`, converting `F16` bit patterns via IEEE-754 half→single.
    pub fn to_f32(&self) -> Result<Vec<f32>> {
        match &self.data {
            TensorData::F32(v) => Ok(v.clone()),
            TensorData::F16(bits) => Ok(bits.iter().map(|&b| f16::from_bits(b).to_f32()).collect()),
            _ => Err(self.type_mismatch(ElementType::F32)),
        }
    }

    pub fn to_i64(&self) -> Result<Vec<i64>> {
        match &self.data {
            TensorData::I64(v) => Ok(v.clone()),
            _ => Err(self.type_mismatch(ElementType::I64)),
        }
    }

    pub fn to_utf8(&self) -> Result<Vec<String>> {
        match &self.data {
            TensorData::Utf8(v) => Ok(v.clone()),
            _ => Err(self.type_mismatch(ElementType::Utf8)),
        }
    }

    /// Raw `F16` bit patterns, exact type only.
    pub fn to_f16_bits(&self) -> Result<Vec<u16>> {
        match &self.data {
            TensorData::F16(v) => Ok(v.clone()),
            _ => Err(self.type_mismatch(ElementType::F16)),
        }
    }

    /// Rank-2 `F32` tensor as `rows x cols` nested rows.
    pub fn to_f32_rows(&self) -> Result<Vec<Vec<f32>>> {
        if self.shape.len() != 2 {
            return Err(OnnxKitError::ShapeMismatch {
                shape: self.shape.clone(),
                expected: 2,
                actual: self.shape.len(),
            });
        }
        let flat = self.to_f32()?;
        let cols = self.shape[1];
        Ok(flat.chunks(cols).map(|c| c.to_vec()).collect())
    }

    /// Extract one index along `axis`, reducing rank by one. Supports negative
    /// indexing for both `axis` and `index` (`-1` = last).
    pub fn slice(&self, axis: i64, index: i64) -> Result<Tensor> {
        let axis = normalize_axis(axis, self.shape.len())?;
        let axis_size = self.shape[axis];
        let index = normalize_index(index, axis_size)?;

        let inner: usize = self.shape[axis + 1..].iter().product();
        let outer: usize = self.shape[..axis].iter().product();
        let stride = axis_size * inner;

        let mut new_shape = self.shape.clone();
        new_shape.remove(axis);

        macro_rules! gather {
            ($v:expr) => {{
                let mut out = Vec::with_capacity(outer * inner);
                for o in 0..outer {
                    let base = o * stride + index * inner;
                    out.extend_from_slice(&$v[base..base + inner]);
                }
                out
            }};
        }

        let data = match &self.data {
            TensorData::F32(v) => TensorData::F32(gather!(v)),
            TensorData::F16(v) => TensorData::F16(gather!(v)),
            TensorData::I64(v) => TensorData::I64(gather!(v)),
            TensorData::Utf8(v) => TensorData::Utf8(gather!(v)),
        };

        Ok(Tensor {
            shape: new_shape,
            data,
        })
    }

    /// Remove all size-1 axes. If every axis was 1, the result shape is `[1]`.
    pub fn squeeze(&self) -> Tensor {
        let mut new_shape: Vec<usize> = self.shape.iter().copied().filter(|&d| d != 1).collect();
        if new_shape.is_empty() {
            new_shape.push(1);
        }
        Tensor {
            shape: new_shape,
            data: self.data.clone(),
        }
    }

    /// Remove a specific size-1 axis.
    pub fn squeeze_axis(&self, axis: usize) -> Result<Tensor> {
        if axis >= self.shape.len() || self.shape[axis] != 1 {
            return Err(OnnxKitError::InvalidSqueeze {
                axis,
                size: *self.shape.get(axis).unwrap_or(&0),
            });
        }
        let mut new_shape = self.shape.clone();
        new_shape.remove(axis);
        Ok(Tensor {
            shape: new_shape,
            data: self.data.clone(),
        })
    }

    /// `F32` → `F16`: bit-exact for already-representable values, finite
    /// overflow saturates to ±Inf (round-to-nearest-even via `half`).
    pub fn cast_to_f16(&self) -> Result<Tensor> {
        let values = self.to_f32()?;
        let bits: Vec<u16> = values.iter().map(|&v| f16::from_f32(v).to_bits()).collect();
        Ok(Tensor {
            shape: self.shape.clone(),
            data: TensorData::F16(bits),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_validation_rejects_mismatched_length() {
        let err = Tensor::from_f32(vec![1.0, 2.0, 3.0], vec![2, 2]).unwrap_err();
        matches!(err, OnnxKitError::ShapeMismatch { .. });
    }

    #[test]
    fn round_trip_f32() {
        let data = vec![1.0, -2.5, 3.25, 0.0];
        let t = Tensor::from_f32(data.clone(), vec![2, 2]).unwrap();
        assert_eq!(t.to_f32().unwrap(), data);
        assert_eq!(t.shape(), vec![2, 2]);
    }

    #[test]
    fn returned_shape_is_a_copy() {
        let t = Tensor::from_f32(vec![1.0, 2.0], vec![2]).unwrap();
        let mut s = t.shape();
        s.push(99);
        assert_eq!(t.shape(), vec![2]);
    }

    #[test]
    fn to_f32_widens_f16() {
        let bits = vec![f16::from_f32(1.5).to_bits(), f16::from_f32(-0.5).to_bits()];
        let t = Tensor::from_f16(bits, vec![2]).unwrap();
        let widened = t.to_f32().unwrap();
        assert!((widened[0] - 1.5).abs() < 1e-6);
        assert!((widened[1] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn to_f32_fails_on_i64() {
        let t = Tensor::from_i64(vec![1, 2], vec![2]).unwrap();
        assert!(matches!(t.to_f32(), Err(OnnxKitError::TypeMismatch { .. })));
    }

    #[test]
    fn slice_reduces_rank_and_copies_outer_inner_block() {
        // shape [2,3,2], slice axis 1 index 1 -> pick middle row of each outer block
        let data: Vec<f32> = (0..12).map(|x| x as f32).collect();
        let t = Tensor::from_f32(data, vec![2, 3, 2]).unwrap();
        let s = t.slice(1, 1).unwrap();
        assert_eq!(s.shape(), vec![2, 2]);
        assert_eq!(s.to_f32().unwrap(), vec![2.0, 3.0, 8.0, 9.0]);
    }

    #[test]
    fn slice_supports_negative_axis_and_index() {
        let data: Vec<f32> = (0..6).map(|x| x as f32).collect();
        let t = Tensor::from_f32(data, vec![2, 3]).unwrap();
        let s = t.slice(-1, -1).unwrap();
        assert_eq!(s.shape(), vec![2]);
        assert_eq!(s.to_f32().unwrap(), vec![2.0, 5.0]);
    }

    #[test]
    fn slice_axis_out_of_range() {
        let t = Tensor::from_f32(vec![1.0], vec![1]).unwrap();
        assert!(matches!(t.slice(5, 0), Err(OnnxKitError::AxisOutOfRange { .. })));
    }

    #[test]
    fn squeeze_removes_all_unit_axes() {
        let t = Tensor::from_f32(vec![1.0, 2.0], vec![1, 2, 1]).unwrap();
        assert_eq!(t.squeeze().shape(), vec![2]);
    }

    #[test]
    fn squeeze_all_ones_keeps_single_axis() {
        let t = Tensor::from_f32(vec![1.0], vec![1, 1, 1]).unwrap();
        assert_eq!(t.squeeze().shape(), vec![1]);
    }

    #[test]
    fn squeeze_axis_rejects_non_unit_axis() {
        let t = Tensor::from_f32(vec![1.0, 2.0], vec![2]).unwrap();
        assert!(matches!(
            t.squeeze_axis(0),
            Err(OnnxKitError::InvalidSqueeze { .. })
        ));
    }

    #[test]
    fn cast_to_f16_round_trips_representable_values() {
        let t = Tensor::from_f32(vec![1.0, 2.0, -4.5], vec![3]).unwrap();
        let half = t.cast_to_f16().unwrap();
        let back = half.to_f32().unwrap();
        assert_eq!(back, vec![1.0, 2.0, -4.5]);
    }

    #[test]
    fn cast_to_f16_overflow_saturates_to_infinity() {
        let t = Tensor::from_f32(vec![1.0e30], vec![1]).unwrap();
        let half = t.cast_to_f16().unwrap();
        assert!(half.to_f32().unwrap()[0].is_infinite());
    }

    #[test]
    fn to_f32_rows_requires_rank_2() {
        let t = Tensor::from_f32(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]).unwrap();
        assert_eq!(t.to_f32_rows().unwrap(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);

        let rank1 = Tensor::from_f32(vec![1.0], vec![1]).unwrap();
        assert!(rank1.to_f32_rows().is_err());
    }
}
