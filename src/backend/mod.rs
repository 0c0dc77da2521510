//! The `Backend` facade: an opaque capability mapping named input tensors
//! to named output tensors. The core never attaches GPU semantics,
//! threading policy, or memory ownership beyond this surface.

use crate::error::Result;
use crate::tensor::{ElementType, Tensor};

#[cfg(feature = "ort-backend")]
pub mod ort_backend;
#[cfg(feature = "ort-backend")]
pub use ort_backend::OrtBackend;

/// An ordered `name -> Tensor` map, preserving insertion order for
/// deterministic iteration over model inputs/outputs.
pub type NamedTensors = Vec<(String, Tensor)>;

pub trait Backend {
    fn input_names(&self) -> Vec<String>;
    fn output_names(&self) -> Vec<String>;
    /// Dynamic axes are reported as `0`.
    fn input_shape(&self, name: &str) -> Option<Vec<usize>>;
    fn input_element_type(&self, name: &str) -> Option<ElementType>;
    /// Blocking. Any backend failure maps to `OnnxKitError::BackendError`.
    fn run(&self, inputs: NamedTensors) -> Result<NamedTensors>;
}

pub(crate) fn get_named<'a>(tensors: &'a NamedTensors, name: &str) -> Option<&'a Tensor> {
    tensors.iter().find(|(n, _)| n == name).map(|(_, t)| t)
}
